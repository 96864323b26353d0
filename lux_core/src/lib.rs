//! This crate generates an iCalendar file of Luxembourg's holidays, festivities and fairs
//! from an editable template, and the static landing page to browse and subscribe to it.
//!
//! The pipeline is [`template`] → [`rule`] → [`calendar`] → [`publish`]. The [`browse`]
//! module holds the filtering and theme model used by the landing page front end.

pub use ical;

pub mod browse;
pub mod calendar;
#[cfg(feature = "publish")]
pub mod publish;
pub mod rule;
pub mod template;
