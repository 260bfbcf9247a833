//! Hand-written protobuf types for the recorded action log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Tags are part of the on-disk format: never renumber, only append.

use prost::Message;

// ── Action Envelope ────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoActionEnvelope {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(uint64, tag = "2")]
    pub at: u64,
    #[prost(message, optional, tag = "3")]
    pub action: Option<ProtoAction>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoAction {
    #[prost(
        oneof = "ActionKind",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15"
    )]
    pub kind: Option<ActionKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ActionKind {
    #[prost(message, tag = "1")]
    Start(Empty),
    #[prost(message, tag = "2")]
    Stop(Empty),
    #[prost(message, tag = "3")]
    Reset(Empty),
    #[prost(message, tag = "4")]
    CountdownTick(Empty),
    #[prost(message, tag = "5")]
    Advance(Empty),
    #[prost(message, tag = "6")]
    ToggleOpen(ItemRef),
    #[prost(message, tag = "7")]
    DraftTask(TaskDraft),
    #[prost(message, tag = "8")]
    SubmitTask(TaskRef),
    #[prost(message, tag = "9")]
    SkipTask(TaskRef),
    #[prost(message, tag = "10")]
    Dismiss(ItemRef),
    #[prost(message, tag = "11")]
    Resolve(ItemRef),
    #[prost(message, tag = "12")]
    DraftCritical(CriticalDraft),
    #[prost(message, tag = "13")]
    SubmitCritical(Empty),
    #[prost(message, tag = "14")]
    ExitCritical(Empty),
    #[prost(message, tag = "15")]
    DismissVerdict(Empty),
}

// ── Payloads ───────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, Message)]
pub struct ItemRef {
    #[prost(string, tag = "1")]
    pub item_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TaskRef {
    #[prost(string, tag = "1")]
    pub task_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TaskDraft {
    #[prost(string, tag = "1")]
    pub task_id: String,
    #[prost(string, tag = "2")]
    pub text: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct CriticalDraft {
    #[prost(string, tag = "1")]
    pub text: String,
}
