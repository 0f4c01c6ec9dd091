#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use styrene_trust::{Boundary, Listener, Pid, Session};

pub struct TestSession {
    pid: Pid,
    name: String,
}

impl Session for TestSession {
    fn process_id(&self) -> Pid {
        self.pid
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn session(pid: i32, name: &str) -> Arc<dyn Session> {
    Arc::new(TestSession { pid: Pid(pid), name: name.to_owned() })
}

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Note {
    Starting(u64),
    Stopping(u64),
    Suspending(u64),
    Resuming(u64),
    Added(u64, String),
    Removed(u64, String),
}

#[derive(Default)]
pub struct NoteTaker {
    notes: Mutex<Vec<Note>>,
}

impl NoteTaker {
    pub fn drain(&self) -> Vec<Note> {
        std::mem::take(&mut *self.notes.lock().expect("notes mutex poisoned"))
    }

    fn push(&self, note: Note) {
        self.notes.lock().expect("notes mutex poisoned").push(note);
    }
}

impl Listener for NoteTaker {
    fn starting(&self, boundary: &Arc<Boundary>) {
        self.push(Note::Starting(boundary.id().0));
    }

    fn stopping(&self, boundary: &Arc<Boundary>) {
        self.push(Note::Stopping(boundary.id().0));
    }

    fn suspending(&self, boundary: &Arc<Boundary>) {
        self.push(Note::Suspending(boundary.id().0));
    }

    fn resuming(&self, boundary: &Arc<Boundary>) {
        self.push(Note::Resuming(boundary.id().0));
    }

    fn participant_added(&self, boundary: &Arc<Boundary>, session: &Arc<dyn Session>) {
        self.push(Note::Added(boundary.id().0, session.name().to_owned()));
    }

    fn participant_removed(&self, boundary: &Arc<Boundary>, session: &Arc<dyn Session>) {
        self.push(Note::Removed(boundary.id().0, session.name().to_owned()));
    }
}
