//! Platform seam: where audio comes from and where it goes
//!
//! The engine never touches files, sockets or devices directly. A backend
//! loads a track into an [`AudioSource`] and plays a finished graph through
//! an [`OutputHandle`]. Desktop builds get [`DesktopBackend`]; tests script
//! their own.

use async_trait::async_trait;
use mood_audio::{AudioSource, Result as AudioResult, SharedGraph};

/// A graph attached to an output
///
/// Dropping the handle without calling [`detach`](OutputHandle::detach) may
/// leave the graph playing; the engine always detaches explicitly.
pub trait OutputHandle: Send {
    fn pause(&mut self);

    /// May be refused (e.g. the device went away)
    fn resume(&mut self) -> AudioResult<()>;

    /// Silence and release the graph; the handle is dead afterwards
    fn detach(&mut self);
}

#[async_trait]
pub trait AudioBackend: Send + Sync + 'static {
    /// Fetch and decode `url` at [`sample_rate`](AudioBackend::sample_rate)
    async fn load(&self, url: &str) -> AudioResult<Box<dyn AudioSource>>;

    /// Start playing `graph`; an error means playback was rejected
    fn open_output(&self, graph: SharedGraph) -> AudioResult<Box<dyn OutputHandle>>;

    /// Rate graphs must be built at
    fn sample_rate(&self) -> u32;
}

#[cfg(feature = "desktop")]
pub use desktop::DesktopBackend;

#[cfg(feature = "desktop")]
mod desktop {
    use super::{AudioBackend, OutputHandle};
    use async_trait::async_trait;
    use mood_audio::{AttachmentId, AudioSource, CpalOutput, Result, SharedGraph, SymphoniaLoader};

    /// Symphonia decoding into the default cpal device
    #[derive(Debug, Clone)]
    pub struct DesktopBackend {
        loader: SymphoniaLoader,
        output: CpalOutput,
    }

    impl DesktopBackend {
        pub fn new() -> Result<Self> {
            let output = CpalOutput::new()?;
            Ok(Self {
                loader: SymphoniaLoader::new(output.sample_rate()),
                output,
            })
        }
    }

    #[async_trait]
    impl AudioBackend for DesktopBackend {
        async fn load(&self, url: &str) -> Result<Box<dyn AudioSource>> {
            let source = self.loader.load(url).await?;
            Ok(Box::new(source))
        }

        fn open_output(&self, graph: SharedGraph) -> Result<Box<dyn OutputHandle>> {
            let id = self.output.attach(graph)?;
            Ok(Box::new(CpalHandle {
                output: self.output.clone(),
                id,
            }))
        }

        fn sample_rate(&self) -> u32 {
            self.output.sample_rate()
        }
    }

    struct CpalHandle {
        output: CpalOutput,
        id: AttachmentId,
    }

    impl OutputHandle for CpalHandle {
        fn pause(&mut self) {
            self.output.pause(self.id);
        }

        fn resume(&mut self) -> Result<()> {
            self.output.resume(self.id)
        }

        fn detach(&mut self) {
            self.output.detach(self.id);
        }
    }
}
