//! # Shutdown signal listener.
//!
//! [`ShutdownSignals`] backs [`Poller::run_until_signal`](crate::Poller::run_until_signal).
//! Listeners are installed by [`ShutdownSignals::listen`], before anything waits on them, so
//! a signal that arrives in between is not lost.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`. **Elsewhere:** `Ctrl-C`.

use std::io;

/// Installed shutdown listeners.
#[cfg(unix)]
pub(crate) struct ShutdownSignals {
    listeners: Vec<(&'static str, tokio::signal::unix::Signal)>,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Installs one listener per shutdown signal.
    pub(crate) fn listen() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let kinds = [
            ("SIGINT", SignalKind::interrupt()),
            ("SIGTERM", SignalKind::terminate()),
            ("SIGQUIT", SignalKind::quit()),
        ];
        let listeners = kinds
            .into_iter()
            .map(|(name, kind)| Ok((name, signal(kind)?)))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self { listeners })
    }

    /// Resolves with the name of the first signal received.
    pub(crate) async fn recv(&mut self) -> io::Result<&'static str> {
        use futures::FutureExt;
        use futures::future::select_all;

        let waits = self
            .listeners
            .iter_mut()
            .map(|(name, listener)| {
                let name = *name;
                listener.recv().map(move |_| name).boxed()
            });
        let (name, _, _) = select_all(waits).await;
        Ok(name)
    }
}

/// Installed shutdown listener.
#[cfg(not(unix))]
pub(crate) struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub(crate) fn listen() -> io::Result<Self> {
        Ok(Self)
    }

    pub(crate) async fn recv(&mut self) -> io::Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}
