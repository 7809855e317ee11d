//! Named-event dispatch between services.
//!
//! Every CRUD service answers its operations as events named
//! `entity.<Name>.<operation>`. Services talk to each other only through the
//! [Dispatcher], so a product service fetches categories by dispatching
//! `entity.Category.findById` rather than holding a reference to the category
//! service.

mod dispatcher;
mod operation;
mod payload;

pub use dispatcher::*;
pub use operation::*;
pub use payload::*;
