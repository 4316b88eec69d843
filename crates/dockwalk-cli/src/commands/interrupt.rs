/// Ctrl-C listener for the build loop.
///
/// On unix the SIGINT handler is registered by [`Interrupt::install`], before
/// the first unit starts staging, so an early Ctrl-C still goes through the
/// cancellation path instead of the default disposition.
pub(crate) struct Interrupt {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

impl Interrupt {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            signal: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?,
        })
    }

    /// Resolve on the next Ctrl-C.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> std::io::Result<()> {
        self.signal.recv().await;
        Ok(())
    }

    /// Resolve on the next Ctrl-C.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sigint_after_install_is_delivered_to_listener() {
        let mut interrupt = Interrupt::install().unwrap();

        let status = std::process::Command::new("sh")
            .args(["-c", &format!("kill -INT {}", std::process::id())])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), interrupt.recv())
            .await
            .expect("SIGINT was not delivered")
            .unwrap();
    }
}
