//! Sequential workflow driver
//!
//! A [`Workflow`] is an explicit, ordered list of typed [`Step`]s grouped into
//! [`Stage`]s. Each step carries a [`Precheck`] that may skip it and a
//! [`Criticality`] that decides whether its failure aborts the run. The
//! [`WorkflowRunner`] consumes the list on a background task and publishes
//! [`WorkflowEvent`]s that front ends drain from an [`EventStream`].

mod driver;
mod error;
mod event;
mod step;

pub use self::{
    driver::WorkflowRunner,
    error::{StepError, WorkflowFailure},
    event::{EventSender, EventStream, WorkflowEvent, WorkflowSummary},
    step::{Criticality, Precheck, Stage, Step, StepAction, Workflow},
};
