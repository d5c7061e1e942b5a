//! Membership coordinator tests
//!
//! Concurrency tests race real threads through a `Barrier` so every join
//! reaches the coordinator at once.

use std::{
    sync::{Arc, Barrier},
    thread,
};

use arena_core::{
    ArenaError, Channel, Member, MemberDirectory, NewMember, RoomEvent, RoomSpec, level_of,
};
use arena_server::{
    BroadcastPublisher, CoordinatorConfig, DrillConfig, MembershipCoordinator, MemoryStore,
    Server, ServerError, ServerRuntimeConfig, SystemEnv,
};

type Coordinator = MembershipCoordinator<SystemEnv, MemoryStore, BroadcastPublisher>;

struct Arena {
    store: Arc<MemoryStore>,
    publisher: Arc<BroadcastPublisher>,
    coordinator: Arc<Coordinator>,
    problem_no: u64,
}

fn arena() -> Arena {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(BroadcastPublisher::new(64));
    let problem_no = store.insert_problem("two sum").unwrap().problem_no;
    let coordinator = Arc::new(MembershipCoordinator::new(
        SystemEnv::new(),
        Arc::clone(&store),
        Arc::clone(&publisher),
        CoordinatorConfig::default(),
    ));
    Arena { store, publisher, coordinator, problem_no }
}

fn members(store: &MemoryStore, count: usize) -> Vec<Member> {
    (0..count)
        .map(|i| {
            store
                .save_member(NewMember {
                    username: format!("user{i}"),
                    nickname: format!("nick{i}"),
                })
                .unwrap()
        })
        .collect()
}

fn public_room(name: &str, limit: u8) -> RoomSpec {
    RoomSpec {
        room_name: name.to_string(),
        is_secret: false,
        password: None,
        limit_member_cnt: limit,
    }
}

fn secret_room(name: &str, password: &str, limit: u8) -> RoomSpec {
    RoomSpec {
        room_name: name.to_string(),
        is_secret: true,
        password: Some(password.to_string()),
        limit_member_cnt: limit,
    }
}

/// Race every member into the room at once; return each join's result.
fn race(
    coordinator: &Arc<Coordinator>,
    room_no: u64,
    contenders: Vec<Member>,
) -> Vec<Result<(), ArenaError>> {
    let barrier = Arc::new(Barrier::new(contenders.len()));
    let handles: Vec<_> = contenders
        .into_iter()
        .map(|member| {
            let coordinator = Arc::clone(coordinator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coordinator.join_by_password(room_no, None, &member).map(|_| ())
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn concurrent_joins_never_exceed_capacity() {
    let arena = arena();
    let room = arena.coordinator.create_room(public_room("duel", 2), arena.problem_no).unwrap();
    let contenders = members(&arena.store, 5);

    let results = race(&arena.coordinator, room.room_no, contenders);

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(ArenaError::RoomFull { capacity: 2, .. })))
        .count();
    assert_eq!(admitted, 2);
    assert_eq!(full, 3);

    let rows = arena.coordinator.members(room.room_no).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|r| r.is_owner).count(), 1);
}

#[test]
fn repeated_races_keep_invariants() {
    for round in 0..20 {
        let arena = arena();
        let room = arena
            .coordinator
            .create_room(public_room(&format!("round{round}"), 4), arena.problem_no)
            .unwrap();
        let contenders = members(&arena.store, 6);

        let results = race(&arena.coordinator, room.room_no, contenders);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);

        let rows = arena.coordinator.members(room.room_no).unwrap();
        assert!(rows.len() <= 4);
        assert_eq!(rows.iter().filter(|r| r.is_owner).count(), 1);
    }
}

#[test]
fn same_member_racing_itself_joins_once() {
    let arena = arena();
    let room = arena.coordinator.create_room(public_room("solo", 6), arena.problem_no).unwrap();
    let alice = members(&arena.store, 1).remove(0);

    let results = race(&arena.coordinator, room.room_no, vec![alice.clone(); 4]);

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
        r,
        Err(ArenaError::AlreadyJoined { user_no, .. }) if *user_no == alice.user_no
    )));
    assert_eq!(arena.coordinator.members(room.room_no).unwrap().len(), 1);
}

#[test]
fn duplicate_join_leaves_count_unchanged() {
    let arena = arena();
    let room = arena.coordinator.create_room(public_room("arena", 4), arena.problem_no).unwrap();
    let alice = members(&arena.store, 1).remove(0);

    arena.coordinator.join_by_password(room.room_no, None, &alice).unwrap();
    assert_eq!(
        arena.coordinator.join_by_password(room.room_no, None, &alice),
        Err(ArenaError::AlreadyJoined { room_no: room.room_no, user_no: alice.user_no })
    );
    assert_eq!(
        arena.coordinator.join_by_invite_code(room.invite_code.as_str(), &alice),
        Err(ArenaError::AlreadyJoined { room_no: room.room_no, user_no: alice.user_no })
    );
    assert_eq!(arena.coordinator.members(room.room_no).unwrap().len(), 1);
}

#[test]
fn invite_code_bypasses_secret_password() {
    let arena = arena();
    let room = arena
        .coordinator
        .create_room(secret_room("vault", "0420", 2), arena.problem_no)
        .unwrap();
    let [alice, bob, carol]: [Member; 3] = members(&arena.store, 3).try_into().unwrap();

    assert_eq!(
        arena.coordinator.join_by_password(room.room_no, None, &alice),
        Err(ArenaError::PasswordMismatch { room_no: room.room_no })
    );

    let view = arena
        .coordinator
        .join_by_invite_code(&room.invite_code.as_str().to_uppercase(), &alice)
        .unwrap();
    assert_eq!(view.room.room_no, room.room_no);
    arena.coordinator.join_by_password(room.room_no, Some("0420"), &bob).unwrap();

    assert_eq!(
        arena.coordinator.join_by_invite_code(room.invite_code.as_str(), &carol),
        Err(ArenaError::RoomFull { room_no: room.room_no, capacity: 2 })
    );
}

#[test]
fn unknown_room_and_code() {
    let arena = arena();
    let alice = members(&arena.store, 1).remove(0);

    assert!(matches!(
        arena.coordinator.join_by_password(404, None, &alice),
        Err(ArenaError::RoomNotFound(_))
    ));
    assert!(matches!(
        arena.coordinator.join_by_invite_code("deadbeef", &alice),
        Err(ArenaError::RoomNotFound(_))
    ));
    assert!(matches!(
        arena.coordinator.join_by_invite_code("not a code", &alice),
        Err(ArenaError::RoomNotFound(_))
    ));
}

#[test]
fn create_room_rejects_bad_requests() {
    let arena = arena();

    assert_eq!(
        arena.coordinator.create_room(public_room("three", 3), arena.problem_no),
        Err(ArenaError::InvalidCapacity { requested: 3 })
    );
    assert!(matches!(
        arena.coordinator.create_room(secret_room("bad", "12a3", 2), arena.problem_no),
        Err(ArenaError::InvalidPassword { .. })
    ));
    assert!(matches!(
        arena.coordinator.create_room(secret_room("short", "123", 2), arena.problem_no),
        Err(ArenaError::InvalidPassword { .. })
    ));
    assert_eq!(
        arena.coordinator.create_room(public_room("orphan", 2), 999),
        Err(ArenaError::ProblemNotFound(999))
    );

    arena.coordinator.create_room(public_room("taken", 2), arena.problem_no).unwrap();
    assert_eq!(
        arena.coordinator.create_room(public_room("taken", 4), arena.problem_no),
        Err(ArenaError::DuplicateRoomName("taken".to_string()))
    );
    assert_eq!(arena.coordinator.list_rooms().unwrap().len(), 1);
}

#[test]
fn concurrent_room_creation_keeps_names_unique() {
    let arena = arena();
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = Arc::clone(&arena.coordinator);
            let barrier = Arc::clone(&barrier);
            let problem_no = arena.problem_no;
            thread::spawn(move || {
                barrier.wait();
                coordinator.create_room(public_room("contested", 2), problem_no)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
        r,
        Err(ArenaError::DuplicateRoomName(name)) if name == "contested"
    )));
}

#[test]
fn invite_codes_are_distinct() {
    let arena = arena();
    let codes: std::collections::HashSet<_> = (0..50)
        .map(|i| {
            arena
                .coordinator
                .create_room(public_room(&format!("room{i}"), 2), arena.problem_no)
                .unwrap()
                .invite_code
        })
        .collect();
    assert_eq!(codes.len(), 50);
}

#[test]
fn join_event_carries_level_of_joiner() {
    let arena = arena();
    let room = arena.coordinator.create_room(public_room("arena", 4), arena.problem_no).unwrap();
    let mut events = arena.publisher.subscribe(&Channel::room(room.room_no));
    let [alice, bob]: [Member; 2] = members(&arena.store, 2).try_into().unwrap();
    let bob = arena.store.award_exp(bob.user_no, 250).unwrap();

    arena.coordinator.join_by_password(room.room_no, None, &alice).unwrap();
    arena.coordinator.join_by_password(room.room_no, None, &bob).unwrap();

    let Ok(RoomEvent::Joined(first)) = events.try_recv() else { panic!("expected join event") };
    assert_eq!((first.nickname.as_str(), first.level, first.is_owner), ("nick0", 1, true));

    let Ok(RoomEvent::Joined(second)) = events.try_recv() else { panic!("expected join event") };
    let level = level_of(250);
    assert_eq!((second.level, second.remainder), (level.level, level.remainder));
    assert_eq!((second.level, second.remainder), (3, 50));
    assert!(!second.is_owner);
}

#[test]
fn ownership_follows_join_order_across_leaves() {
    let arena = arena();
    let room = arena.coordinator.create_room(public_room("arena", 6), arena.problem_no).unwrap();
    let crew = members(&arena.store, 4);
    for member in &crew {
        arena.coordinator.join_by_password(room.room_no, None, member).unwrap();
    }

    for (leaver, heir) in crew.iter().zip(crew.iter().skip(1)) {
        let outcome = arena.coordinator.leave(room.room_no, leaver).unwrap();
        assert_eq!(outcome.new_owner, Some(heir.user_no));
    }

    let last = crew.last().unwrap();
    let outcome = arena.coordinator.leave(room.room_no, last).unwrap();
    assert_eq!(outcome.new_owner, None);
    assert!(arena.coordinator.members(room.room_no).unwrap().is_empty());
}

#[test]
fn concurrent_leaves_and_joins_keep_single_owner() {
    let arena = arena();
    let room = arena.coordinator.create_room(public_room("churn", 6), arena.problem_no).unwrap();
    let crew = members(&arena.store, 6);
    for member in &crew[..3] {
        arena.coordinator.join_by_password(room.room_no, None, member).unwrap();
    }

    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = crew
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, member)| {
            let coordinator = Arc::clone(&arena.coordinator);
            let barrier = Arc::clone(&barrier);
            let room_no = room.room_no;
            thread::spawn(move || {
                barrier.wait();
                if i < 3 {
                    coordinator.leave(room_no, &member).map(|_| ())
                } else {
                    coordinator.join_by_password(room_no, None, &member).map(|_| ())
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let rows = arena.coordinator.members(room.room_no).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().filter(|r| r.is_owner).count() <= 1);
}

#[tokio::test]
async fn drill_admits_exactly_capacity() {
    let server = Server::new(ServerRuntimeConfig {
        drill: DrillConfig { contenders: 5, capacity: 2 },
        ..Default::default()
    })
    .unwrap();

    let report = server.run_drill().await.unwrap();

    assert_eq!(report.admitted, 2);
    assert_eq!(report.rejected_full, 3);
    assert_eq!(report.rejected_other, 0);
    assert_eq!(report.events, 2);
    assert_eq!(report.owners, 1);
    assert_eq!(report.listing.len(), 1);
    assert_eq!(report.listing[0].member_count, 2);
    // contender0 has the least exp.
    assert_eq!(report.leaderboard.user_rank, 5);
    assert_eq!(report.leaderboard.top[0].nickname, "Contender 4");
}

#[test]
fn server_rejects_invalid_drill_config() {
    let result = Server::new(ServerRuntimeConfig {
        drill: DrillConfig { contenders: 5, capacity: 3 },
        ..Default::default()
    });
    assert!(matches!(result, Err(ServerError::Config(_))));

    let result = Server::new(ServerRuntimeConfig {
        drill: DrillConfig { contenders: 0, capacity: 2 },
        ..Default::default()
    });
    assert!(matches!(result, Err(ServerError::Config(_))));
}
