//! End-to-end tests over the in-process network
//!
//! Registry, routers and users live in one process and exchange messages
//! through `LocalNetwork`, the same way the HTTP deployment does across
//! processes.
//!
//! Run with: cargo test --test integration_local_network

use onionmesh_core::relay::{OnionRouter, User, UserError};
use onionmesh_core::transport::LocalNetwork;
use onionmesh_core::{Address, NodeRegistry, PortLayout, RelayError, RsaKeyPair};
use std::sync::{Arc, OnceLock};

fn shared_keys() -> &'static [RsaKeyPair] {
    static KEYS: OnceLock<Vec<RsaKeyPair>> = OnceLock::new();
    KEYS.get_or_init(|| (0..5).map(|_| RsaKeyPair::generate().unwrap()).collect())
}

struct TestNetwork {
    layout: PortLayout,
    registry: Arc<NodeRegistry>,
    network: Arc<LocalNetwork>,
    routers: Vec<Arc<OnionRouter>>,
    users: Vec<Arc<User>>,
}

async fn launch(router_count: usize, user_count: u32) -> TestNetwork {
    let layout = PortLayout::default();
    let registry = Arc::new(NodeRegistry::new());
    let network = Arc::new(LocalNetwork::new());

    let mut routers = Vec::new();
    for (node_id, keys) in shared_keys().iter().take(router_count).enumerate() {
        let router = Arc::new(OnionRouter::with_keys(node_id as u32, &layout, keys.clone()).unwrap());
        router.register(registry.as_ref()).await.unwrap();
        network.attach_router(router.clone());
        routers.push(router);
    }

    let mut users = Vec::new();
    for user_id in 0..user_count {
        let user = Arc::new(User::new(user_id, layout).unwrap());
        network.attach_user(user.clone());
        users.push(user);
    }

    TestNetwork {
        layout,
        registry,
        network,
        routers,
        users,
    }
}

impl TestNetwork {
    fn router(&self, node_id: u32) -> &Arc<OnionRouter> {
        &self.routers[node_id as usize]
    }
}

#[tokio::test]
async fn test_message_reaches_recipient_through_three_relays() {
    let net = launch(5, 2).await;
    let (alice, bob) = (&net.users[0], &net.users[1]);

    let circuit = alice
        .send_to_user("hello bob", 1, net.registry.as_ref(), net.network.as_ref())
        .await
        .unwrap();

    assert_eq!(bob.last_received_message().as_deref(), Some("hello bob"));
    assert_eq!(alice.last_sent_message().as_deref(), Some("hello bob"));
    assert_eq!(alice.last_circuit(), circuit.node_ids());
    assert!(alice.last_received_message().is_none());

    // Each relay forwarded to the next one; the exit forwarded to bob
    let ids = circuit.node_ids();
    for pair in ids.windows(2) {
        let hop = net.router(pair[0]);
        assert_eq!(hop.last_message_destination(), Some(net.layout.router(pair[1]).unwrap()));
        assert_ne!(hop.last_received_decrypted_message().as_deref(), Some("hello bob"));
    }
    let exit = net.router(*ids.last().unwrap());
    assert_eq!(exit.last_message_destination(), Some(bob.address()));
    assert_eq!(exit.last_received_decrypted_message().as_deref(), Some("hello bob"));

    // Relays outside the circuit saw nothing
    for router in &net.routers {
        if !ids.contains(&router.node_id()) {
            assert!(router.last_received_encrypted_message().is_none());
        }
    }

    println!("✓ Circuit {:?} delivered the message", ids);
}

#[tokio::test]
async fn test_entry_relay_sees_what_sender_sent() {
    let net = launch(3, 2).await;
    let alice = &net.users[0];

    let circuit = alice
        .send("ping", Address::new(5001), net.registry.as_ref(), net.network.as_ref())
        .await
        .unwrap();
    let ids = circuit.node_ids();

    // What one relay forwarded is exactly what the next relay received
    for pair in ids.windows(2) {
        assert_eq!(
            net.router(pair[0]).last_received_decrypted_message(),
            net.router(pair[1]).last_received_encrypted_message()
        );
    }
}

#[tokio::test]
async fn test_degraded_circuit_still_delivers() {
    let net = launch(2, 2).await;

    let circuit = net.users[0]
        .send_to_user("two hops", 1, net.registry.as_ref(), net.network.as_ref())
        .await
        .unwrap();

    assert_eq!(circuit.len(), 2);
    assert_eq!(net.users[1].last_received_message().as_deref(), Some("two hops"));
}

#[tokio::test]
async fn test_lost_hop_is_silent_to_sender() {
    let net = launch(3, 2).await;
    let (alice, bob) = (&net.users[0], &net.users[1]);

    alice
        .send_to_user("first", 1, net.registry.as_ref(), net.network.as_ref())
        .await
        .unwrap();
    assert_eq!(bob.last_received_message().as_deref(), Some("first"));

    // Router 1 goes offline but stays registered; with three relays and
    // three hops it is on every circuit
    net.network.detach(net.router(1).address());

    let mut silent_losses = 0;
    for attempt in 0..30 {
        let message = format!("lost {}", attempt);
        let result = alice
            .send_to_user(&message, 1, net.registry.as_ref(), net.network.as_ref())
            .await;

        if alice.last_circuit()[0] == 1 {
            // The sender's own hop is the only failure it ever sees
            assert!(matches!(result, Err(UserError::Transport(_))));
        } else {
            assert!(result.is_ok());
            silent_losses += 1;
        }
        assert_eq!(bob.last_received_message().as_deref(), Some("first"));
    }

    assert!(silent_losses > 0);
}

#[tokio::test]
async fn test_router_rejects_foreign_envelope() {
    let net = launch(2, 1).await;
    let router = net.router(0);

    let err = router
        .receive("not an onion".repeat(40), net.network.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Peel(_)));
    assert!(router.last_message_destination().is_none());
}

#[tokio::test]
async fn test_router_registration_is_once() {
    let net = launch(2, 0).await;

    let err = net.router(1).register(net.registry.as_ref()).await.unwrap_err();
    assert!(matches!(err, RelayError::Registration(_)));
    assert_eq!(net.registry.len(), 2);
}

#[tokio::test]
async fn test_concurrent_sends_land_intact() {
    let net = launch(4, 3).await;
    let registry = net.registry.clone();
    let network = net.network.clone();

    let mut tasks = Vec::new();
    for (sender, target) in [(0usize, 2u32), (1, 2)] {
        let user = net.users[sender].clone();
        let registry = registry.clone();
        let network = network.clone();
        tasks.push(tokio::spawn(async move {
            let message = format!("from user {}", sender);
            let result = user
                .send_to_user(&message, target, registry.as_ref(), network.as_ref())
                .await;
            result.map(|_| message)
        }));
    }

    let mut sent = Vec::new();
    for task in tasks {
        sent.push(task.await.unwrap().unwrap());
    }

    // Last writer wins, but it is always one complete message
    let received = net.users[2].last_received_message().unwrap();
    assert!(sent.contains(&received));
}
