use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// 停止シグナルの送信側
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Arc<watch::Sender<bool>>,
}

/// 停止シグナルの受信側
///
/// 複製して各ループ・各サイクルへ渡す。
#[derive(Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

/// 停止シグナルの送受信ペアを作成
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (
        ShutdownTrigger {
            sender: Arc::new(sender),
        },
        Shutdown { receiver },
    )
}

impl ShutdownTrigger {
    /// 停止を通知する。複数回呼んでも良い
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// 停止が通知されるまで待つ
    ///
    /// 送信側がすべて破棄された場合は停止されないものとして待ち続ける。
    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// 停止が通知されるまで`future`を実行する。停止された場合はNone
    pub async fn run_until<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.wait() => None,
            output = future => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_all_receivers() {
        let (trigger, shutdown) = channel();
        let other = shutdown.clone();
        assert!(!shutdown.is_triggered());

        let waiter = tokio::spawn(async move { other.wait().await });
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("停止通知で起床しなかった")
            .unwrap();
        assert!(shutdown.is_triggered());

        // 通知後のwaitは即座に戻る
        shutdown.wait().await;
    }

    #[tokio::test]
    async fn test_run_until() {
        let (trigger, shutdown) = channel();
        assert_eq!(shutdown.run_until(async { 1 }).await, Some(1));

        trigger.trigger();
        let never = std::future::pending::<i32>();
        assert_eq!(shutdown.run_until(never).await, None);
    }

    #[tokio::test]
    async fn test_dropped_trigger_never_stops() {
        let (trigger, shutdown) = channel();
        drop(trigger);

        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown.wait()).await;
        assert!(waited.is_err(), "送信側の破棄は停止とみなさない");
    }
}
