//! libp2p host: TCP + noise + yamux, gossipsub on the indexer ingest topic.
//!
//! The swarm is owned by a single task. Everything else talks to it through
//! [`HostHandle`], which sends [`HostCommand`]s over an mpsc channel. The
//! indexer is pinned as an explicit gossipsub peer, dialled on startup and
//! redialled whenever the connection is lost.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ar_announce::{string_to_priv_key, AnnounceError};
use async_trait::async_trait;
use futures_util::StreamExt;
use libp2p::gossipsub::{self, IdentTopic, MessageAuthenticity, PublishError, ValidationMode};
use libp2p::identity::Keypair;
use libp2p::multiaddr::Protocol;
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::{noise, tcp, yamux, Multiaddr, PeerId, Swarm, SwarmBuilder};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::AnnounceSink;

const COMMAND_BUFFER: usize = 64;
const REDIAL_INTERVAL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Behaviour / config
// ---------------------------------------------------------------------------

#[derive(NetworkBehaviour)]
pub struct ProviderBehaviour {
    pub gossipsub: gossipsub::Behaviour,
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub topic: String,
    /// Full indexer address, ending in `/p2p/<peer id>`.
    pub indexer: Multiaddr,
    pub listen: Vec<Multiaddr>,
    pub idle_connection_timeout: Duration,
}

/// Decode the host key from its base64 protobuf form, if one was configured.
pub fn load_identity(encoded: Option<&str>) -> Result<Option<Keypair>> {
    match encoded {
        None => Ok(None),
        Some(s) => {
            let kp = string_to_priv_key(s).context("provider identity key")?;
            Ok(Some(kp))
        }
    }
}

fn indexer_peer_id(addr: &Multiaddr) -> Result<PeerId> {
    match addr.iter().last() {
        Some(Protocol::P2p(id)) => Ok(id),
        _ => Err(anyhow!("indexer multiaddr '{addr}' must end in /p2p/<peer id>")),
    }
}

fn build_swarm(keypair: Keypair, idle_timeout: Duration) -> Result<Swarm<ProviderBehaviour>> {
    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)?
        .with_behaviour(|key| {
            let config = gossipsub::ConfigBuilder::default()
                .heartbeat_interval(Duration::from_secs(1))
                .validation_mode(ValidationMode::Strict)
                .flood_publish(true)
                .build()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{e:?}")))?;
            let gossipsub =
                gossipsub::Behaviour::new(MessageAuthenticity::Signed(key.clone()), config)?;
            Ok(ProviderBehaviour { gossipsub })
        })?
        .with_swarm_config(|c| c.with_idle_connection_timeout(idle_timeout))
        .build();
    Ok(swarm)
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

pub enum HostCommand {
    Publish {
        data: Vec<u8>,
        reply: oneshot::Sender<Result<(), String>>,
    },
}

#[derive(Clone)]
pub struct HostHandle {
    peer_id: PeerId,
    cmd_tx: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

#[async_trait]
impl AnnounceSink for HostHandle {
    async fn announce(&self, payload: Vec<u8>) -> Result<(), AnnounceError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(HostCommand::Publish { data: payload, reply })
            .await
            .map_err(|_| AnnounceError::protocol("host stopped"))?;
        rx.await
            .map_err(|_| AnnounceError::protocol("host stopped"))?
            .map_err(AnnounceError::Protocol)
    }
}

// ---------------------------------------------------------------------------
// Startup + event loop
// ---------------------------------------------------------------------------

/// Build the swarm, join the topic, dial the indexer and spawn the event loop.
///
/// Without a configured key the host runs under a fresh ephemeral identity.
pub fn spawn_host(
    keypair: Option<Keypair>,
    config: HostConfig,
    cancel: CancellationToken,
) -> Result<(HostHandle, Keypair, JoinHandle<()>)> {
    let keypair = match keypair {
        Some(kp) => kp,
        None => {
            warn!("no provider identity key configured, using an ephemeral identity");
            Keypair::generate_ed25519()
        }
    };
    let indexer_id = indexer_peer_id(&config.indexer)?;

    let mut swarm = build_swarm(keypair.clone(), config.idle_connection_timeout)
        .context("failed to build libp2p swarm")?;
    let peer_id = *swarm.local_peer_id();

    let topic = IdentTopic::new(&config.topic);
    swarm
        .behaviour_mut()
        .gossipsub
        .subscribe(&topic)
        .map_err(|e| anyhow!("failed to join topic {}: {e:?}", config.topic))?;
    swarm.behaviour_mut().gossipsub.add_explicit_peer(&indexer_id);

    for addr in &config.listen {
        swarm
            .listen_on(addr.clone())
            .with_context(|| format!("failed to listen on {addr}"))?;
    }
    if let Err(e) = swarm.dial(config.indexer.clone()) {
        warn!(indexer = %config.indexer, error = %e, "initial indexer dial failed, will retry");
    }
    info!(peer_id = %peer_id, topic = %config.topic, indexer = %config.indexer, "libp2p host started");

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = HostHandle {
        peer_id,
        cmd_tx,
    };
    let join = tokio::spawn(run_host_loop(swarm, topic, config.indexer, indexer_id, cmd_rx, cancel));
    Ok((handle, keypair, join))
}

async fn run_host_loop(
    mut swarm: Swarm<ProviderBehaviour>,
    topic: IdentTopic,
    indexer: Multiaddr,
    indexer_id: PeerId,
    mut cmd_rx: mpsc::Receiver<HostCommand>,
    cancel: CancellationToken,
) {
    let mut redial =
        tokio::time::interval_at(tokio::time::Instant::now() + REDIAL_INTERVAL, REDIAL_INTERVAL);
    redial.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = redial.tick() => {
                if !swarm.is_connected(&indexer_id) {
                    if let Err(e) = swarm.dial(indexer.clone()) {
                        debug!(error = %e, "indexer redial failed");
                    }
                }
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => handle_command(&mut swarm, &topic, cmd),
                None => break,
            },
            event = swarm.select_next_some() => handle_event(event, indexer_id),
        }
    }
    info!("libp2p host stopped");
}

fn handle_command(swarm: &mut Swarm<ProviderBehaviour>, topic: &IdentTopic, cmd: HostCommand) {
    match cmd {
        HostCommand::Publish { data, reply } => {
            let res = match swarm.behaviour_mut().gossipsub.publish(topic.clone(), data) {
                Ok(id) => {
                    debug!(message_id = %id, "announce gossiped");
                    Ok(())
                }
                // Not connected yet: the head is still recorded and the
                // indexer picks it up from the next announce.
                Err(PublishError::InsufficientPeers) => {
                    warn!("no gossip peers for announce, indexer not connected");
                    Ok(())
                }
                Err(e) => Err(format!("gossip publish failed: {e}")),
            };
            let _ = reply.send(res);
        }
    }
}

fn handle_event(event: SwarmEvent<ProviderBehaviourEvent>, indexer_id: PeerId) {
    match event {
        SwarmEvent::NewListenAddr { address, .. } => {
            info!(address = %address, "libp2p listening");
        }
        SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
            if peer_id == indexer_id {
                info!(remote = %endpoint.get_remote_address(), "connected to indexer");
            } else {
                debug!(peer_id = %peer_id, "peer connected");
            }
        }
        SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
            if peer_id == indexer_id {
                warn!(cause = ?cause, "indexer connection closed");
            } else {
                debug!(peer_id = %peer_id, "peer disconnected");
            }
        }
        SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
            debug!(peer_id = ?peer_id, error = %error, "outgoing connection failed");
        }
        SwarmEvent::Behaviour(ProviderBehaviourEvent::Gossipsub(gossipsub::Event::Subscribed {
            peer_id,
            topic,
        })) => {
            debug!(peer_id = %peer_id, topic = %topic, "peer joined topic");
        }
        _ => {}
    }
}
