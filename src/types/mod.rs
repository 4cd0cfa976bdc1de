pub mod action;
pub mod page;
pub mod worker;

pub use action::{
    Action, ActionHistoryEntry, ActionPlan, ActionType, ExecutionResult, ScrollDirection, WaitKind,
};
pub use page::{
    AttributePair, ContentArea, DomSnapshot, ElementInfo, ElementRect, FormElement, FormField,
    InteractiveElement, NavLink, NavigationRegion, PageMetadata, PageState, SelectorSource,
    Viewport,
};
pub use worker::{StatusReport, WorkerCommand, WorkerReply, WorkerStatus};
