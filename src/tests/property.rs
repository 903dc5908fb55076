//! Property-based tests for verifying scheduler and semaphore invariants.

use super::helpers::*;
use crate::config::MAX_THREADS;
use crate::errors::KernelError;
use crate::thread::ThreadId;
use std::vec::Vec;

#[test]
fn property_semaphore_counter_tracks_waits_and_signals() {
    for seed in [0x1234_5678, 0xDEAD_BEEF, 42, 7] {
        let mut rng = SimpleRng::new(seed);
        let kernel = kernel();
        for _ in 0..4 {
            spawn(&kernel, 1, "worker");
        }
        let initial = rng.gen_range(0, 3) as i32;
        let sem = kernel.create_semaphore(initial).expect("registry has room");
        kernel.launch().expect("threads scheduled");

        let (mut waits, mut signals) = (0, 0);
        for _ in 0..300 {
            let on_app_thread = kernel.thread_id() != ThreadId::BACKGROUND;
            if on_app_thread && rng.gen_bool() {
                kernel.wait(sem);
                waits += 1;
            } else {
                let unblocked = kernel.signal(sem);
                signals += 1;
                let value = kernel.semaphore_value(sem).expect("issued");
                assert_eq!(unblocked.is_some(), value <= 0);
            }
            service_switch(&kernel);
            if rng.gen_range(0, 4) == 0 {
                run_ticks(&kernel, 1);
            }

            let value = kernel.semaphore_value(sem).expect("issued");
            assert_eq!(value, initial - waits + signals);
            assert_eq!(blocked_count(&kernel) as i32, (-value).max(0));
            assert!(kernel.ring_is_consistent());
        }
    }
}

#[test]
fn property_ring_survives_add_and_kill() {
    let mut rng = SimpleRng::new(0xC0FF_EE00);
    let kernel = kernel();
    let mut alive: Vec<ThreadId> = Vec::new();

    for _ in 0..500 {
        let add = alive.is_empty() || rng.gen_bool();
        if add {
            let result = kernel.add_thread(noop, rng.gen_range(0, 8) as u8, "t");
            if alive.len() == MAX_THREADS {
                assert_eq!(result, Err(KernelError::ThreadLimitReached));
            } else {
                let id = result.expect("pool has room");
                assert!(!alive.contains(&id));
                alive.push(id);
            }
        } else {
            let index = rng.gen_range(0, alive.len() as u64) as usize;
            let id = alive[index];
            let result = kernel.kill_thread(id);
            if alive.len() == 1 {
                assert_eq!(result, Err(KernelError::CannotKillLastThread));
            } else {
                assert_eq!(result, Ok(()));
                alive.remove(index);
            }
        }

        assert!(kernel.ring_is_consistent());
        assert_eq!(kernel.thread_count(), alive.len());
        // Ring order is creation order among the survivors.
        let ring = ring(&kernel);
        assert_eq!(ring[0], ThreadId::BACKGROUND);
        assert_eq!(&ring[1..], &alive[..]);
    }
}

#[test]
fn property_lowest_priority_value_is_always_selected() {
    let mut rng = SimpleRng::new(0x5EED);
    let kernel = kernel();
    let mut threads = Vec::new();
    for _ in 0..8 {
        let priority = rng.gen_range(0, 5) as u8;
        threads.push((spawn(&kernel, priority, "p"), priority));
    }
    kernel.launch().expect("threads scheduled");

    for _ in 0..100 {
        run_ticks(&kernel, 1);
        let running = kernel.thread_id();
        let best = threads
            .iter()
            .filter(|(id, _)| kernel.thread_info(*id).is_some_and(|info| info.state.is_runnable()))
            .map(|&(_, priority)| priority)
            .min();
        match best {
            Some(priority) => {
                let running_priority = kernel.thread_info(running).map(|info| info.priority);
                assert_eq!(running_priority, Some(priority));
            }
            None => assert_eq!(running, ThreadId::BACKGROUND),
        }

        // Put the running thread to sleep now and then to shake up the set.
        if rng.gen_range(0, 3) == 0 {
            kernel.sleep(rng.gen_range(1, 5) as u32);
            service_switch(&kernel);
        }
    }
}
