//! Slash-command tree and dispatcher.
//!
//! The tree is a static forest of groups and leaves with typed options. The
//! dispatcher resolves an inbound invocation to exactly one leaf, exposes the
//! leaf-level arguments through [`Arguments`], and runs either the leaf's
//! action handler or the focused option's autocomplete handler.

pub mod dispatch;
pub mod invocation;
pub mod options;
pub mod schema;
pub mod tree;

pub use dispatch::{traverse, AutocompleteResult, DispatchError, Dispatcher, Route};
pub use invocation::{ArgumentError, Arguments, Context, EntryKind, Invocation, InvocationOption};
pub use options::{CommandOption, OptionChoice, OptionKind, OptionValue};
pub use schema::{CommandSchema, OptionSchema};
pub use tree::{
    ActionHandler, AutocompleteHandler, CommandNode, CommandTree, HandlerError, HandlerFuture,
    Reply, TreeError,
};
