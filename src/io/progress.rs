use std::sync::{Mutex, OnceLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionProgress {
    Stage(&'static str),
    Finished,
}

type ProgressCb = Box<dyn Fn(SessionProgress) + Send + 'static>;

static SESSION_PROGRESS_CB: OnceLock<Mutex<Option<ProgressCb>>> = OnceLock::new();

pub fn set_progress_callback(cb: impl Fn(SessionProgress) + Send + 'static) {
    let slot = SESSION_PROGRESS_CB.get_or_init(|| Mutex::new(None));
    if let Ok(mut g) = slot.lock() {
        *g = Some(Box::new(cb));
    }
}

pub fn clear_progress_callback() {
    if let Some(m) = SESSION_PROGRESS_CB.get() {
        if let Ok(mut g) = m.lock() {
            *g = None;
        }
    }
}

pub fn emit_progress(progress: SessionProgress) {
    if let Some(m) = SESSION_PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(progress);
            }
        }
    }
}

pub(crate) fn emit_stage(stage: &'static str) {
    emit_progress(SessionProgress::Stage(stage));
}
