use tokio::sync::mpsc;

/// Sending half of the round-complete mailbox.
///
/// The mailbox holds a single pending signal; signals raised while one is
/// already waiting collapse into it.
#[derive(Clone)]
pub struct RoundSignal {
    sender: mpsc::Sender<()>,
}

pub struct RoundSignalReceiver {
    receiver: mpsc::Receiver<()>,
}

pub fn round_signal() -> (RoundSignal, RoundSignalReceiver) {
    let (sender, receiver) = mpsc::channel(1);
    (RoundSignal { sender }, RoundSignalReceiver { receiver })
}

impl RoundSignal {
    /// Returns `false` when the signal coalesced into one already pending
    /// or nobody is listening any more.
    pub fn notify(&self) -> bool {
        self.sender.try_send(()).is_ok()
    }
}

impl RoundSignalReceiver {
    /// Resolves to `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<()> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> bool {
        self.receiver.try_recv().is_ok()
    }
}
