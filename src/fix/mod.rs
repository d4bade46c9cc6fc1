//! FIX 4.4 order-entry gateway: tag-value codec, session bookkeeping, and the
//! TCP acceptor that bridges sessions to the engine.

mod acceptor;
pub mod message;
pub mod session;

pub use acceptor::run_fix_acceptor;
pub use message::{
    execution_report, order_from_new_order_single, parse_fix_message, reject_report, FixMessage,
    FixWriter,
};
pub use session::{SessionAdapter, SessionKey, SessionRegistry};
