//! Proto ↔ engine conversion bridge.
//!
//! Converts between protobuf wire types (proto_types.rs) and the
//! engine's typed `ActionEnvelope`. The mapping is total in the
//! engine → proto direction; decoding rejects frames with no action.

use courtroom_engine::{Action, ActionEnvelope};

use crate::error::{Result, RuntimeError};
use crate::proto_types::*;

/// Convert a protobuf envelope to the engine's `ActionEnvelope`.
pub fn proto_to_action(proto: &ProtoActionEnvelope) -> Result<ActionEnvelope> {
    let kind = proto
        .action
        .as_ref()
        .and_then(|a| a.kind.as_ref())
        .ok_or_else(|| RuntimeError::MalformedFrame {
            sequence: proto.sequence,
            message: "frame carries no action".to_string(),
        })?;

    let action = match kind {
        ActionKind::Start(_) => Action::Start,
        ActionKind::Stop(_) => Action::Stop,
        ActionKind::Reset(_) => Action::Reset,
        ActionKind::CountdownTick(_) => Action::CountdownTick,
        ActionKind::Advance(_) => Action::Advance,
        ActionKind::ToggleOpen(r) => Action::ToggleOpen {
            item_id: r.item_id.clone(),
        },
        ActionKind::DraftTask(d) => Action::DraftTask {
            task_id: d.task_id.clone(),
            text: d.text.clone(),
        },
        ActionKind::SubmitTask(r) => Action::SubmitTask {
            task_id: r.task_id.clone(),
        },
        ActionKind::SkipTask(r) => Action::SkipTask {
            task_id: r.task_id.clone(),
        },
        ActionKind::Dismiss(r) => Action::Dismiss {
            item_id: r.item_id.clone(),
        },
        ActionKind::Resolve(r) => Action::Resolve {
            item_id: r.item_id.clone(),
        },
        ActionKind::DraftCritical(d) => Action::DraftCritical {
            text: d.text.clone(),
        },
        ActionKind::SubmitCritical(_) => Action::SubmitCritical,
        ActionKind::ExitCritical(_) => Action::ExitCritical,
        ActionKind::DismissVerdict(_) => Action::DismissVerdict,
    };

    Ok(ActionEnvelope::new(proto.sequence, proto.at, action))
}

/// Convert an engine `ActionEnvelope` to its protobuf form.
pub fn action_to_proto(envelope: &ActionEnvelope) -> ProtoActionEnvelope {
    let kind = match &envelope.action {
        Action::Start => ActionKind::Start(Empty {}),
        Action::Stop => ActionKind::Stop(Empty {}),
        Action::Reset => ActionKind::Reset(Empty {}),
        Action::CountdownTick => ActionKind::CountdownTick(Empty {}),
        Action::Advance => ActionKind::Advance(Empty {}),
        Action::ToggleOpen { item_id } => ActionKind::ToggleOpen(ItemRef {
            item_id: item_id.clone(),
        }),
        Action::DraftTask { task_id, text } => ActionKind::DraftTask(TaskDraft {
            task_id: task_id.clone(),
            text: text.clone(),
        }),
        Action::SubmitTask { task_id } => ActionKind::SubmitTask(TaskRef {
            task_id: task_id.clone(),
        }),
        Action::SkipTask { task_id } => ActionKind::SkipTask(TaskRef {
            task_id: task_id.clone(),
        }),
        Action::Dismiss { item_id } => ActionKind::Dismiss(ItemRef {
            item_id: item_id.clone(),
        }),
        Action::Resolve { item_id } => ActionKind::Resolve(ItemRef {
            item_id: item_id.clone(),
        }),
        Action::DraftCritical { text } => ActionKind::DraftCritical(CriticalDraft {
            text: text.clone(),
        }),
        Action::SubmitCritical => ActionKind::SubmitCritical(Empty {}),
        Action::ExitCritical => ActionKind::ExitCritical(Empty {}),
        Action::DismissVerdict => ActionKind::DismissVerdict(Empty {}),
    };

    ProtoActionEnvelope {
        sequence: envelope.sequence,
        at: envelope.at,
        action: Some(ProtoAction { kind: Some(kind) }),
    }
}
