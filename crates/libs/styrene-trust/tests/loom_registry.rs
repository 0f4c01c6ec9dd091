#![cfg(feature = "loom-tests")]

use loom::thread;
use std::sync::Arc;
use styrene_trust::{BoundaryId, ParticipantRegistry, Pid, Role, Session};

struct Peer(i32);

impl Session for Peer {
    fn process_id(&self) -> Pid {
        Pid(self.0)
    }
}

fn peer(pid: i32) -> Arc<dyn Session> {
    Arc::new(Peer(pid))
}

#[test]
fn concurrent_inserts_get_distinct_positions() {
    loom::model(|| {
        let registry = loom::sync::Arc::new(ParticipantRegistry::new());
        let boundary = BoundaryId(1);
        registry.register_boundary(boundary);

        let first = peer(10);
        let second = peer(11);

        let handle = {
            let registry = registry.clone();
            let first = Arc::clone(&first);
            thread::spawn(move || {
                registry.insert_participant(boundary, &first, Role::Provider).expect("insert first")
            })
        };
        let inserted_second = registry
            .insert_participant(boundary, &second, Role::Provider)
            .expect("insert second");
        let inserted_first = handle.join().expect("join");

        assert!(inserted_first && inserted_second);
        let snapshot = registry.snapshot();
        let seqs = snapshot.boundaries[0]
            .participants
            .iter()
            .map(|participant| participant.seq)
            .collect::<Vec<_>>();
        assert_eq!(seqs.len(), 2);
        assert!(seqs[0] < seqs[1]);
    });
}

#[test]
fn racing_duplicate_inserts_have_one_winner() {
    loom::model(|| {
        let registry = loom::sync::Arc::new(ParticipantRegistry::new());
        let boundary = BoundaryId(1);
        registry.register_boundary(boundary);
        registry.insert_waiting_process(boundary, Pid(10)).expect("wait");

        let shared = peer(10);
        let handle = {
            let registry = registry.clone();
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                registry.insert_participant(boundary, &shared, Role::Provider).expect("insert")
            })
        };
        let here = registry.insert_participant(boundary, &shared, Role::Provider).expect("insert");
        let there = handle.join().expect("join");

        assert!(here ^ there);
        assert_eq!(registry.participant_count(boundary, Some(Role::Provider)), 1);
        assert_eq!(registry.waiting_count(boundary), 0);
    });
}

#[test]
fn unregister_racing_insert_leaves_nothing_behind() {
    loom::model(|| {
        let registry = loom::sync::Arc::new(ParticipantRegistry::new());
        let boundary = BoundaryId(1);
        registry.register_boundary(boundary);

        let member = peer(10);
        let handle = {
            let registry = registry.clone();
            let member = Arc::clone(&member);
            thread::spawn(move || registry.insert_participant(boundary, &member, Role::Provider))
        };
        registry.unregister_boundary(boundary);
        let outcome = handle.join().expect("join");

        assert!(matches!(outcome, Ok(true) | Err(_)));
        assert!(!registry.is_registered(boundary));
        assert_eq!(registry.participant_count(boundary, None), 0);
    });
}
