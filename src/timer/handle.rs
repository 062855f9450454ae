//! Async handle to a countdown owned by the countdown loop task

use tokio::sync::{mpsc, oneshot};

use super::{
    countdown::{TimerView, Transition},
    observer::{SubscriptionId, TimerObserver},
};
use crate::{
    error::{Result, TimerError},
    state::TimerSnapshot,
};

/// Requests processed in order by the countdown loop
pub enum Command {
    Start {
        minutes: f64,
        reply: oneshot::Sender<Result<Transition>>,
    },
    Pause {
        reply: oneshot::Sender<Transition>,
    },
    Resume {
        reply: oneshot::Sender<Transition>,
    },
    Stop {
        reply: oneshot::Sender<Transition>,
    },
    AddTime {
        minutes: f64,
        reply: oneshot::Sender<Result<Transition>>,
    },
    View {
        reply: oneshot::Sender<TimerView>,
    },
    Serialize {
        reply: oneshot::Sender<TimerSnapshot>,
    },
    Restore {
        snapshot: TimerSnapshot,
        reply: oneshot::Sender<Transition>,
    },
    CheckInvariants {
        reply: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        observer: Box<dyn TimerObserver>,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable handle; every call is a round trip to the loop task
#[derive(Debug, Clone)]
pub struct TimerHandle {
    tx: mpsc::Sender<Command>,
}

impl TimerHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    pub async fn start(&self, minutes: f64) -> Result<Transition> {
        self.request(|reply| Command::Start { minutes, reply }).await?
    }

    pub async fn pause(&self) -> Result<Transition> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<Transition> {
        self.request(|reply| Command::Resume { reply }).await
    }

    pub async fn stop(&self) -> Result<Transition> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn add_time(&self, minutes: f64) -> Result<Transition> {
        self.request(|reply| Command::AddTime { minutes, reply }).await?
    }

    pub async fn view(&self) -> Result<TimerView> {
        self.request(|reply| Command::View { reply }).await
    }

    pub async fn remaining_ms(&self) -> Result<u64> {
        Ok(self.view().await?.remaining_ms)
    }

    pub async fn serialize(&self) -> Result<TimerSnapshot> {
        self.request(|reply| Command::Serialize { reply }).await
    }

    pub async fn restore(&self, snapshot: TimerSnapshot) -> Result<Transition> {
        self.request(|reply| Command::Restore { snapshot, reply }).await
    }

    pub async fn check_invariants(&self) -> Result<()> {
        self.request(|reply| Command::CheckInvariants { reply }).await?
    }

    pub async fn subscribe(&self, observer: impl TimerObserver + 'static) -> Result<SubscriptionId> {
        let observer: Box<dyn TimerObserver> = Box::new(observer);
        self.request(|reply| Command::Subscribe { observer, reply }).await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        self.request(|reply| Command::Unsubscribe { id, reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| TimerError::LoopClosed)?;
        rx.await.map_err(|_| TimerError::LoopClosed)
    }
}
