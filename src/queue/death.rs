//! ### English
//! Producer liveness links.
//!
//! The remote producer keeps a [`DeathToken`]; dropping it (normally because the producer went away
//! without disconnecting) fires the paired [`DeathNotice`]. The queue watches the notice on a named
//! background thread and disconnects that producer connection on its behalf.
//!
//! ### 中文
//! 生产者存活链接。
//!
//! 远端生产者持有 [`DeathToken`]；当其被 drop（通常是生产者未断开连接就消失）时，配对的 [`DeathNotice`]
//! 会触发。队列在一个具名后台线程上监视该通知，并代替生产者断开该连接。

use std::io;
use std::sync::Weak;
use std::thread;

use crossbeam_channel as channel;

use super::ProducerApi;
use super::shared_state::BufferQueueCore;
use super::producer::BufferQueueProducer;

enum Never {}

/// ### English
/// Held by the producer for as long as it is alive.
///
/// ### 中文
/// 生产者存活期间一直持有。
pub struct DeathToken {
    _alive: channel::Sender<Never>,
}

/// ### English
/// Observes a [`DeathToken`]; fires once every token clone is dropped.
///
/// ### 中文
/// 观察 [`DeathToken`]；当 token 全部被 drop 时触发。
#[derive(Clone)]
pub struct DeathNotice {
    rx: channel::Receiver<Never>,
}

impl DeathNotice {
    /// ### English
    /// True once the producer side is gone.
    ///
    /// ### 中文
    /// 生产者一侧已消失时返回 true。
    pub fn is_dead(&self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(channel::TryRecvError::Disconnected)
        )
    }
}

/// ### English
/// Creates a linked token / notice pair.
///
/// ### 中文
/// 创建一对相互关联的 token / notice。
pub fn death_link() -> (DeathToken, DeathNotice) {
    let (tx, rx) = channel::bounded(0);
    (DeathToken { _alive: tx }, DeathNotice { rx })
}

/// ### English
/// Running watch on one producer connection. Dropping it stops the watcher thread.
///
/// ### 中文
/// 针对某个生产者连接的监视。drop 时会停止监视线程。
pub(crate) struct DeathWatch {
    _cancel: channel::Sender<Never>,
}

/// ### English
/// Spawns the watcher thread for `connection_id`.
///
/// #### Parameters
/// - `core`: Queue core; held weakly so an idle watcher never keeps the queue alive.
/// - `notice`: Liveness link from the producer listener.
/// - `api`: Api that connection used.
/// - `connection_id`: Identifies the connection; a later reconnect is never disconnected by a stale
///   watcher.
///
/// ### 中文
/// 为 `connection_id` 启动监视线程。
///
/// #### 参数
/// - `core`：队列核心；以弱引用持有，空闲的监视线程不会让队列保持存活。
/// - `notice`：来自生产者监听器的存活链接。
/// - `api`：该连接使用的 api。
/// - `connection_id`：连接标识；过期的监视线程不会断开之后的重连。
pub(crate) fn watch(
    core: Weak<BufferQueueCore>,
    notice: DeathNotice,
    api: ProducerApi,
    connection_id: u64,
) -> io::Result<DeathWatch> {
    let (cancel_tx, cancel_rx) = channel::bounded::<Never>(0);
    thread::Builder::new()
        .name("BufferQueueDeathWatch".to_string())
        .spawn(move || {
            channel::select! {
                recv(notice.rx) -> _ => {
                    if let Some(core) = core.upgrade() {
                        BufferQueueProducer::from_core(core).disconnect_dead_producer(api, connection_id);
                    }
                }
                recv(cancel_rx) -> _ => {}
            }
        })?;
    Ok(DeathWatch { _cancel: cancel_tx })
}
