//! The typed action layer. Every externally-triggered operation is a
//! `Command` value dispatched through [`execute`], or an equivalent direct
//! call into the per-entity action modules. Actions are the only writers
//! that run in user mode; everything below them is derivation.

pub mod composer;
pub mod thread;

use crate::{entities::thread::FoldState, error::Error};
use loomdb_core::{env::Env, store::RecordId};

///
/// Command
///
/// The closed set of user-facing operations. Dispatching a command twice is
/// always safe: each action either converges to the same state or detects
/// the duplicate and does nothing.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    OpenThread { thread: RecordId },
    FoldThread { thread: RecordId, state: FoldState },
    MarkThreadAsSeen { thread: RecordId, message: RecordId },
    MarkThreadAsFetched { thread: RecordId },
    PinThread { thread: RecordId },
    UnpinThread { thread: RecordId },
    UnsubscribeThread { thread: RecordId },
    RenameThread { thread: RecordId, name: String },
    LoadNewMessages { thread: RecordId },
    RegisterCurrentPartnerIsTyping { thread: RecordId },
    RefreshCurrentPartnerIsTyping { thread: RecordId },
    UnregisterCurrentPartnerIsTyping { thread: RecordId },
    RegisterOtherMemberTypingMember { thread: RecordId, partner: RecordId },
    RefreshOtherMemberTypingMember { thread: RecordId, partner: RecordId },
    UnregisterOtherMemberTypingMember { thread: RecordId, partner: RecordId },
    PostMessage { composer: RecordId },
}

/// Run one command to completion, including the recomputation settle and
/// any observer triggers it causes. `PostMessage` answers the posted
/// message's record id; every other command answers `None`.
pub fn execute(env: &mut Env, command: Command) -> Result<Option<RecordId>, Error> {
    tracing::debug!(?command, "execute");
    match command {
        Command::OpenThread { thread } => thread::open(env, thread)?,
        Command::FoldThread { thread, state } => thread::fold(env, thread, state)?,
        Command::MarkThreadAsSeen { thread, message } => {
            thread::mark_as_seen(env, thread, message)?;
        }
        Command::MarkThreadAsFetched { thread } => thread::mark_as_fetched(env, thread)?,
        Command::PinThread { thread } => thread::pin(env, thread)?,
        Command::UnpinThread { thread } => thread::unpin(env, thread)?,
        Command::UnsubscribeThread { thread } => thread::unsubscribe(env, thread)?,
        Command::RenameThread { thread, name } => thread::rename(env, thread, &name)?,
        Command::LoadNewMessages { thread } => {
            thread::load_new_messages(env, thread)?;
        }
        Command::RegisterCurrentPartnerIsTyping { thread } => {
            thread::register_current_partner_is_typing(env, thread)?;
        }
        Command::RefreshCurrentPartnerIsTyping { thread } => {
            thread::refresh_current_partner_is_typing(env, thread)?;
        }
        Command::UnregisterCurrentPartnerIsTyping { thread } => {
            thread::unregister_current_partner_is_typing(env, thread)?;
        }
        Command::RegisterOtherMemberTypingMember { thread, partner } => {
            thread::register_other_member_typing_member(env, thread, partner)?;
        }
        Command::RefreshOtherMemberTypingMember { thread, partner } => {
            thread::refresh_other_member_typing_member(env, thread, partner)?;
        }
        Command::UnregisterOtherMemberTypingMember { thread, partner } => {
            thread::unregister_other_member_typing_member(env, thread, partner)?;
        }
        Command::PostMessage { composer } => return composer::post_message(env, composer),
    }

    Ok(None)
}
