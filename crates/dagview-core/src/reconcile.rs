//! Reconciliation loop: the single writer of the block-list view.
//!
//! Live events, page results and user navigation are serialised through one
//! queue. After every event the loop publishes a fresh [`ViewSnapshot`] on a
//! `watch` channel; readers never see the view mid-mutation.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dagview_rpc::{NodeEvent, NodeTransport, SubscriptionHandle};

use crate::config::ExplorerConfig;
use crate::daemon::Daemon;
use crate::error::ExplorerError;
use crate::view::{BlockListView, Effect, ViewEvent, ViewSnapshot};

/// Cloneable handle for driving a running [`ReconcileLoop`] and reading its
/// snapshots.
#[derive(Clone)]
pub struct ViewHandle {
    tx: mpsc::UnboundedSender<ViewEvent>,
    snapshots: watch::Receiver<Arc<ViewSnapshot>>,
}

impl ViewHandle {
    /// Page toward older blocks. Returns `false` once the loop has stopped.
    pub fn go_older(&self) -> bool {
        self.tx.send(ViewEvent::GoOlder).is_ok()
    }

    pub fn go_newer(&self) -> bool {
        self.tx.send(ViewEvent::GoNewer).is_ok()
    }

    /// Refetch the current page.
    pub fn reload(&self) -> bool {
        self.tx.send(ViewEvent::Reload).is_ok()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ViewSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Wait for the next snapshot. Returns `false` once the loop has stopped.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }
}

/// Owns the view and applies every inbound event to it in arrival order.
pub struct ReconcileLoop {
    daemon: Daemon,
    view: BlockListView,
    tx: mpsc::UnboundedSender<ViewEvent>,
    rx: mpsc::UnboundedReceiver<ViewEvent>,
    snapshots: watch::Sender<Arc<ViewSnapshot>>,
}

impl ReconcileLoop {
    pub fn new(daemon: Daemon, view: BlockListView) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(Arc::new(view.snapshot()));
        Self {
            daemon,
            view,
            tx,
            rx,
            snapshots,
        }
    }

    /// A loop over a fresh live-tail view sized by `config`.
    pub fn from_config(daemon: Daemon, config: &ExplorerConfig) -> Self {
        let view = BlockListView::new(config.window_size, config.refresh_info_on_block);
        Self::new(daemon, view)
    }

    pub fn handle(&self) -> ViewHandle {
        ViewHandle {
            tx: self.tx.clone(),
            snapshots: self.snapshots.subscribe(),
        }
    }

    /// Subscribe to live events, load the current page and process events
    /// until `shutdown` resolves.
    ///
    /// Fails only if the initial subscriptions cannot be made.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ExplorerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            daemon,
            mut view,
            tx,
            mut rx,
            snapshots,
        } = self;
        let transport = Arc::clone(daemon.transport());

        let (handles, forwarders) = subscribe_live(&transport, &tx).await?;
        info!(
            url = transport.url(),
            page_size = view.page_size(),
            "reconcile loop started"
        );

        let mut initial = view.apply(ViewEvent::Reload);
        initial.push(Effect::RefreshInfo);
        execute(&daemon, &tx, initial);
        snapshots.send_replace(Arc::new(view.snapshot()));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(event) = rx.recv() => {
                    let effects = view.apply(event);
                    execute(&daemon, &tx, effects);
                    snapshots.send_replace(Arc::new(view.snapshot()));
                }
            }
        }

        for forwarder in forwarders {
            forwarder.abort();
        }
        for handle in handles {
            let event = handle.event;
            if let Err(e) = transport.unsubscribe(handle).await {
                warn!(error = %e, %event, "unsubscribe failed");
            }
        }
        info!("reconcile loop stopped");
        Ok(())
    }
}

/// Subscribe to both live events and forward their payloads into the queue.
/// On failure, subscriptions already made are released.
async fn subscribe_live(
    transport: &Arc<dyn NodeTransport>,
    tx: &mpsc::UnboundedSender<ViewEvent>,
) -> Result<(Vec<SubscriptionHandle>, Vec<JoinHandle<()>>), ExplorerError> {
    let mut handles = Vec::new();
    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();

    for event in [NodeEvent::NewBlock, NodeEvent::BlockOrdered] {
        let (handle, mut payloads) = match transport.subscribe(event).await {
            Ok(sub) => sub,
            Err(e) => {
                for forwarder in &forwarders {
                    forwarder.abort();
                }
                for handle in handles {
                    let _ = transport.unsubscribe(handle).await;
                }
                return Err(e.into());
            }
        };
        handles.push(handle);

        let tx = tx.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(payload) = payloads.recv().await {
                let event = match event {
                    NodeEvent::NewBlock => ViewEvent::NewBlock(payload),
                    NodeEvent::BlockOrdered => ViewEvent::BlockOrdered(payload),
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        }));
    }
    Ok((handles, forwarders))
}

/// Run effects in the background; results come back through the queue.
/// Not connected is a no-op.
fn execute(daemon: &Daemon, tx: &mpsc::UnboundedSender<ViewEvent>, effects: Vec<Effect>) {
    for effect in effects {
        if !daemon.is_connected() {
            debug!(?effect, "not connected, skipping");
            continue;
        }
        let daemon = daemon.clone();
        let tx = tx.clone();
        match effect {
            Effect::FetchPage(request) => {
                tokio::spawn(async move {
                    let result = daemon
                        .load_block_page(request.upper_bound, request.size)
                        .await;
                    let _ = tx.send(ViewEvent::PageLoaded { request, result });
                });
            }
            Effect::RefreshInfo => {
                tokio::spawn(async move {
                    let result = daemon.get_info().await;
                    let _ = tx.send(ViewEvent::InfoLoaded(result));
                });
            }
        }
    }
}
