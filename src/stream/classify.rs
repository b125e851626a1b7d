//! Decides which work changes affect product histories.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::constants::{PRIMARY_WORK_TYPE, TAG_CURRENT, UPD_NOTE_UNPROCESSED};
use crate::store::operations::works::{ModelRef, Work};
use crate::stream::event::{ChangeEvent, EventName};

/// How an accepted event patches product histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeKind {
    /// A finished work re-created by an admin; lands at its chronological position.
    Insert,
    /// The executor's most recent work was just finished (or re-released after an edit).
    Modify,
    Remove,
}

impl MergeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Modify => "modify",
            Self::Remove => "remove",
        }
    }
}

/// The fields of an accepted work the merger needs. Accepted works are always finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedWork {
    pub id: String,
    pub start: DateTime<Utc>,
    pub fin: DateTime<Utc>,
    pub exec_name: String,
    pub work_type: String,
    pub work_sub_type: Option<String>,
    pub tag: Option<String>,
    pub upd_note: Option<String>,
    pub model: ModelRef,
    pub prior_tag: Option<String>,
    pub prior_upd_note: Option<String>,
}

impl NormalizedWork {
    pub fn duration_ms(&self) -> i64 {
        (self.fin - self.start).num_milliseconds()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub kind: MergeKind,
    pub work: NormalizedWork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnhandledEvent,
    MissingImage(EventName),
    NotPrimaryWorkType(String),
    NotAccepted(EventName),
    Unfinished(EventName),
    NoProducts,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnhandledEvent => write!(f, "event kind is not handled by the work stream"),
            Self::MissingImage(name) => write!(f, "{} event carries no work image", name.as_str()),
            Self::NotPrimaryWorkType(work_type) => {
                write!(f, "work type '{work_type}' does not build product histories")
            }
            Self::NotAccepted(name) => {
                write!(f, "{} is not a finish, edit release or admin re-insert", name.as_str())
            }
            Self::Unfinished(name) => write!(f, "{} of a work that never finished", name.as_str()),
            Self::NoProducts => write!(f, "work references no model products"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Accepted(ClassifiedEvent),
    Skipped(SkipReason),
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn is(value: &Option<String>, expected: &str) -> bool {
    value.as_deref() == Some(expected)
}

pub fn classify(event: &ChangeEvent) -> Classification {
    let (kind, work, prior) = match (event.event_name, &event.old_image, &event.new_image) {
        (EventName::Insert, _, Some(new)) => (MergeKind::Insert, new, None),
        (EventName::Modify, Some(old), Some(new)) => (MergeKind::Modify, new, Some(old)),
        (EventName::Remove, Some(old), _) => (MergeKind::Remove, old, Some(old)),
        (EventName::Unknown, _, _) => return Classification::Skipped(SkipReason::UnhandledEvent),
        (name, _, _) => return Classification::Skipped(SkipReason::MissingImage(name)),
    };

    if work.work_type != PRIMARY_WORK_TYPE {
        return Classification::Skipped(SkipReason::NotPrimaryWorkType(work.work_type.clone()));
    }

    let accepted = match (kind, prior) {
        (MergeKind::Modify, Some(old)) => {
            let just_finished = is_blank(&work.tag) && is(&old.tag, TAG_CURRENT);
            let edit_released = is_blank(&work.upd_note) && is(&old.upd_note, UPD_NOTE_UNPROCESSED);
            just_finished || edit_released
        }
        (MergeKind::Modify, None) => false,
        (MergeKind::Insert, _) => work.fin.is_some(),
        (MergeKind::Remove, _) => true,
    };
    if !accepted {
        return Classification::Skipped(SkipReason::NotAccepted(event.event_name));
    }

    let Some(fin) = work.fin else {
        return Classification::Skipped(SkipReason::Unfinished(event.event_name));
    };
    let Some(model) = work.model().filter(|m| !m.prods.is_empty()) else {
        return Classification::Skipped(SkipReason::NoProducts);
    };

    Classification::Accepted(ClassifiedEvent {
        kind,
        work: normalize(work, fin, model, prior),
    })
}

fn normalize(work: &Work, fin: DateTime<Utc>, model: &ModelRef, prior: Option<&Work>) -> NormalizedWork {
    NormalizedWork {
        id: work.id.clone(),
        start: work.start,
        fin,
        exec_name: work.exec_name.clone(),
        work_type: work.work_type.clone(),
        work_sub_type: work.work_sub_type.clone(),
        tag: work.tag.clone(),
        upd_note: work.upd_note.clone(),
        model: model.clone(),
        prior_tag: prior.and_then(|p| p.tag.clone()),
        prior_upd_note: prior.and_then(|p| p.upd_note.clone()),
    }
}
