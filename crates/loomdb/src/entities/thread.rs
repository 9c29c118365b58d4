use loomdb_core::{
    env::Env,
    error::InternalError,
    model::{DepPath, EntityModel, TriggerModel, attr, many2many, many2one, one2many, one2one},
    obs::BusEvent,
    store::{FieldCommand, Patch, RecordId, RecordIdentity, Store},
    value::{IdentityValue, Value},
};

/// Backend model name of server-synchronized channels. Threads of other
/// models (documents, mailing lists) never sync fold/seen/typing state.
pub const CHANNEL_MODEL: &str = "mail.channel";

///
/// FoldState
///
/// The chat-window fold state machine: open, folded (title bar only), or
/// closed. Mirrored between a local pending value and the last
/// server-confirmed value; the pending value wins until the server agrees.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FoldState {
    Open,
    Folded,
    Closed,
}

impl FoldState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Folded => "folded",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "open" => Some(Self::Open),
            "folded" => Some(Self::Folded),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

// ---- derivations --------------------------------------------------------

fn message_id(store: &Store, message: RecordId) -> i64 {
    store.value(message, "id").as_int().unwrap_or_default()
}

fn ordered_messages(store: &Store, id: RecordId) -> FieldCommand {
    let mut ids = store.ids(id, "messages").to_vec();
    ids.sort_by_key(|m| message_id(store, *m));

    FieldCommand::Replace(ids)
}

fn ordered_non_transient_messages(store: &Store, id: RecordId) -> FieldCommand {
    let ids = store
        .ids(id, "ordered_messages")
        .iter()
        .copied()
        .filter(|m| !store.value(*m, "is_transient").is_truthy())
        .collect();

    FieldCommand::Replace(ids)
}

fn last_message(store: &Store, id: RecordId) -> FieldCommand {
    match store.ids(id, "ordered_messages").last() {
        Some(last) => FieldCommand::link_one(*last),
        None => FieldCommand::UnlinkAll,
    }
}

fn last_non_transient_message(store: &Store, id: RecordId) -> FieldCommand {
    match store.ids(id, "ordered_non_transient_messages").last() {
        Some(last) => FieldCommand::link_one(*last),
        None => FieldCommand::UnlinkAll,
    }
}

/// The single other member of a direct chat. Group channels have none.
fn correspondent(store: &Store, id: RecordId) -> FieldCommand {
    if store.value(id, "channel_type").as_text() == Some("channel") {
        return FieldCommand::UnlinkAll;
    }
    let members = store.ids(id, "members");
    let current = store.current_partner();
    if let Some(other) = members.iter().find(|m| Some(**m) != current) {
        return FieldCommand::link_one(*other);
    }
    // chat with oneself
    if members.len() == 1 {
        return FieldCommand::link_one(members[0]);
    }

    FieldCommand::UnlinkAll
}

fn display_name(store: &Store, id: RecordId) -> FieldCommand {
    if store.value(id, "channel_type").as_text() == Some("chat")
        && let Some(partner) = store.one(id, "correspondent")
    {
        let custom = store.value(id, "custom_channel_name");
        let value = if custom.is_truthy() {
            custom.clone()
        } else {
            store.value(partner, "name_or_display_name").clone()
        };
        return FieldCommand::Set(value);
    }

    FieldCommand::Set(store.value(id, "name").clone())
}

fn is_chat_channel(store: &Store, id: RecordId) -> FieldCommand {
    let chat = store.value(id, "channel_type").as_text() == Some("chat");

    FieldCommand::Set(Value::Bool(chat))
}

/// Pending pin state wins over the server-confirmed one until confirmed.
fn is_pinned(store: &Store, id: RecordId) -> FieldCommand {
    let pending = store.value(id, "is_pending_pinned");
    let value = if pending.is_null() {
        store.value(id, "is_server_pinned").is_truthy()
    } else {
        pending.is_truthy()
    };

    FieldCommand::Set(Value::Bool(value))
}

/// Pending fold state wins over the server-confirmed one until confirmed.
fn fold_state(store: &Store, id: RecordId) -> FieldCommand {
    let pending = store.value(id, "pending_fold_state");
    let value = if pending.is_null() {
        store.value(id, "server_fold_state").clone()
    } else {
        pending.clone()
    };

    FieldCommand::Set(value)
}

fn has_seen_indicators(store: &Store, id: RecordId) -> FieldCommand {
    let enabled = store.value(id, "model").as_text() == Some(CHANNEL_MODEL)
        && !store.value(id, "is_mass_mailing").is_truthy()
        && matches!(
            store.value(id, "channel_type").as_text(),
            Some("chat" | "livechat")
        );

    FieldCommand::Set(Value::Bool(enabled))
}

/// Extends the server-known seen marker over trailing messages the current
/// partner needs no notification for: their own messages and transient ones.
/// Stops at the first other-author message.
fn last_seen_by_current_partner_message_id(store: &Store, id: RecordId) -> FieldCommand {
    let known = store
        .value(id, "known_last_seen_message_id")
        .as_int()
        .unwrap_or_default();
    let current = store.current_partner();

    let mut last_seen = known;
    for message in store.ids(id, "ordered_messages") {
        let mid = message_id(store, *message);
        if mid <= known {
            continue;
        }
        let own = current.is_some() && store.one(*message, "author") == current;
        if own || store.value(*message, "is_transient").is_truthy() {
            last_seen = mid;
            continue;
        }
        break;
    }

    FieldCommand::Set(Value::Int(last_seen))
}

/// Trust the server counter up to the last message it counted from; once the
/// local message window covers the seen marker, count fully locally and
/// ignore a potentially stale server value.
fn local_message_unread_counter(store: &Store, id: RecordId) -> FieldCommand {
    let mut base = store
        .value(id, "server_message_unread_counter")
        .as_int()
        .unwrap_or_default();
    let mut count_from = store
        .value(id, "server_last_message_id")
        .as_int()
        .unwrap_or_default();

    let ordered = store.ids(id, "ordered_messages");
    let last_seen = store
        .value(id, "last_seen_by_current_partner_message_id")
        .as_int()
        .unwrap_or_default();
    if let Some(first) = ordered.first()
        && last_seen != 0
        && last_seen >= message_id(store, *first)
    {
        base = 0;
        count_from = last_seen;
    }

    let local: i64 = ordered
        .iter()
        .filter(|m| message_id(store, **m) > count_from)
        .count() as i64;

    FieldCommand::Set(Value::Int(base + local))
}

/// The message before which the "new messages" separator is rendered.
fn message_after_new_message_separator(store: &Store, id: RecordId) -> FieldCommand {
    if store.value(id, "model").as_text() != Some(CHANNEL_MODEL) {
        return FieldCommand::UnlinkAll;
    }
    if store.value(id, "local_message_unread_counter").as_int() == Some(0) {
        return FieldCommand::UnlinkAll;
    }
    let last_seen = store
        .value(id, "last_seen_by_current_partner_message_id")
        .as_int()
        .unwrap_or_default();
    let ordered = store.ids(id, "ordered_messages");
    let index = ordered
        .iter()
        .position(|m| message_id(store, *m) == last_seen);
    let next = match index {
        Some(i) => ordered.get(i + 1),
        None => ordered.first(),
    };

    match next {
        Some(message) => FieldCommand::link_one(*message),
        None => FieldCommand::UnlinkAll,
    }
}

/// Typing members in registration order, excluding the current partner.
fn ordered_other_typing_members(store: &Store, id: RecordId) -> FieldCommand {
    let current = store.current_partner();
    let ids = store
        .ids(id, "typing_members")
        .iter()
        .copied()
        .filter(|m| Some(*m) != current)
        .collect();

    FieldCommand::Replace(ids)
}

fn typing_status_text(store: &Store, id: RecordId) -> FieldCommand {
    let typers = store.ids(id, "ordered_other_typing_members");
    let name = |m: &RecordId| {
        store
            .value(*m, "name_or_display_name")
            .as_text()
            .unwrap_or_default()
            .to_string()
    };

    let text = match typers {
        [] => String::new(),
        [a] => format!("{} is typing...", name(a)),
        [a, b] => format!("{} and {} are typing...", name(a), name(b)),
        [a, b, ..] => format!("{}, {} and more are typing...", name(a), name(b)),
    };

    FieldCommand::Set(Value::Text(text))
}

fn all_attachments(store: &Store, id: RecordId) -> FieldCommand {
    let mut ids: Vec<RecordId> = store
        .ids(id, "origin_thread_attachments")
        .iter()
        .chain(store.ids(id, "attachments"))
        .copied()
        .collect();
    ids.sort_by_key(|a| std::cmp::Reverse(store.value(*a, "id").as_int().unwrap_or_default()));
    ids.dedup();

    FieldCommand::Replace(ids)
}

/// The most recent message of the current partner that every other member
/// has seen, per the thread's seen-info bookkeeping.
fn last_current_partner_message_seen_by_everyone(store: &Store, id: RecordId) -> FieldCommand {
    let Some(current) = store.current_partner() else {
        return FieldCommand::UnlinkAll;
    };
    let other_seen_ids: Vec<i64> = store
        .ids(id, "partner_seen_infos")
        .iter()
        .filter(|info| store.one(**info, "partner") != Some(current))
        .map(|info| {
            store
                .one(*info, "last_seen_message")
                .map_or(0, |m| message_id(store, m))
        })
        .collect();
    let Some(everyone_seen) = other_seen_ids.into_iter().min() else {
        return FieldCommand::UnlinkAll;
    };

    let seen = store
        .ids(id, "ordered_messages")
        .iter()
        .rev()
        .find(|m| {
            store.one(**m, "author") == Some(current) && message_id(store, **m) <= everyone_seen
        })
        .copied();

    match seen {
        Some(message) => FieldCommand::link_one(message),
        None => FieldCommand::UnlinkAll,
    }
}

// ---- triggers -----------------------------------------------------------

/// A confirmed pin state matching the pending one clears the pending flag;
/// a non-matching confirmation leaves it pending.
fn sync_pending_pin(env: &mut Env, id: RecordId) -> Result<(), InternalError> {
    let pending = env.store.value(id, "is_pending_pinned");
    if pending.is_null() {
        return Ok(());
    }
    if pending.is_truthy() == env.store.value(id, "is_server_pinned").is_truthy() {
        return env.update(id, Patch::new().clear("is_pending_pinned"));
    }

    Ok(())
}

fn sync_pending_fold(env: &mut Env, id: RecordId) -> Result<(), InternalError> {
    let pending = env.store.value(id, "pending_fold_state");
    if pending.is_null() {
        return Ok(());
    }
    if pending == env.store.value(id, "server_fold_state") {
        return env.update(id, Patch::new().clear("pending_fold_state"));
    }

    Ok(())
}

fn announce_last_seen_changed(env: &mut Env, id: RecordId) -> Result<(), InternalError> {
    env.bus.publish(&BusEvent::ThreadLastSeenChanged { thread: id });

    Ok(())
}

// ---- model --------------------------------------------------------------

/// A conversation: channel, direct chat, or any server document's message
/// feed. Identity is `(model, id)` because the server reuses numeric ids
/// across model types.
#[must_use]
pub fn model() -> EntityModel {
    EntityModel::new(
        "thread",
        vec![
            attr("model").id(),
            attr("id").id(),
            attr("name").default(""),
            attr("custom_channel_name").default(""),
            attr("channel_type").default(""),
            attr("uuid").default(""),
            attr("is_temporary").default(false),
            attr("is_mass_mailing").default(false),
            // pin state: pending (tri-state, Null = nothing pending) vs server
            attr("is_pending_pinned"),
            attr("is_server_pinned").default(false),
            // fold state machine
            attr("pending_fold_state"),
            attr("server_fold_state").default("closed"),
            // seen bookkeeping
            attr("known_last_seen_message_id").default(0),
            attr("pending_seen_message_id").default(0),
            attr("server_last_message_id").default(0),
            attr("server_message_unread_counter").default(0),
            // last typing status notified to the server
            attr("typing_notified_is_typing").default(false),
            // written relations
            many2many("members", "partner", "member_threads"),
            many2many("messages", "message", "threads"),
            one2one("composer", "composer", "thread")
                .causal()
                .insert_by_default(),
            one2many("partner_seen_infos", "seen_info", "thread").causal(),
            many2many("attachments", "attachment", "threads"),
            one2many("origin_thread_attachments", "attachment", "origin_thread"),
            many2many("typing_members", "partner", "typing_threads"),
            // derived relations
            many2one("correspondent", "partner", "correspondent_threads").computed(
                vec![DepPath::Local("channel_type"), DepPath::Local("members")],
                correspondent,
            ),
            many2many("ordered_messages", "message", "ordered_in_threads").computed(
                vec![DepPath::Local("messages"), DepPath::Via("messages", "id")],
                ordered_messages,
            ),
            many2many(
                "ordered_non_transient_messages",
                "message",
                "ordered_non_transient_in_threads",
            )
            .computed(
                vec![
                    DepPath::Local("ordered_messages"),
                    DepPath::Via("ordered_messages", "is_transient"),
                ],
                ordered_non_transient_messages,
            ),
            many2one("last_message", "message", "last_message_of")
                .computed(vec![DepPath::Local("ordered_messages")], last_message),
            many2one("last_non_transient_message", "message", "last_non_transient_message_of")
                .computed(
                    vec![DepPath::Local("ordered_non_transient_messages")],
                    last_non_transient_message,
                ),
            many2one("message_after_new_message_separator", "message", "separator_of").computed(
                vec![
                    DepPath::Local("model"),
                    DepPath::Local("local_message_unread_counter"),
                    DepPath::Local("last_seen_by_current_partner_message_id"),
                    DepPath::Local("ordered_messages"),
                ],
                message_after_new_message_separator,
            ),
            many2many("ordered_other_typing_members", "partner", "other_typing_threads")
                .computed(
                    vec![DepPath::Local("typing_members")],
                    ordered_other_typing_members,
                ),
            many2many("all_attachments", "attachment", "all_attachments_of").computed(
                vec![
                    DepPath::Local("attachments"),
                    DepPath::Local("origin_thread_attachments"),
                    DepPath::Via("attachments", "id"),
                    DepPath::Via("origin_thread_attachments", "id"),
                ],
                all_attachments,
            ),
            many2one(
                "last_current_partner_message_seen_by_everyone",
                "message",
                "seen_by_everyone_of",
            )
            .computed(
                vec![
                    DepPath::Local("partner_seen_infos"),
                    DepPath::Via("partner_seen_infos", "last_seen_message"),
                    DepPath::Via("partner_seen_infos", "partner"),
                    DepPath::Local("ordered_messages"),
                    DepPath::Via("ordered_messages", "author"),
                ],
                last_current_partner_message_seen_by_everyone,
            ),
            // derived attributes
            attr("display_name").default("").computed(
                vec![
                    DepPath::Local("channel_type"),
                    DepPath::Local("correspondent"),
                    DepPath::Local("custom_channel_name"),
                    DepPath::Local("name"),
                    DepPath::Via("correspondent", "name_or_display_name"),
                ],
                display_name,
            ),
            attr("is_chat_channel")
                .default(false)
                .computed(vec![DepPath::Local("channel_type")], is_chat_channel),
            attr("is_pinned").default(false).computed(
                vec![
                    DepPath::Local("is_pending_pinned"),
                    DepPath::Local("is_server_pinned"),
                ],
                is_pinned,
            ),
            attr("fold_state").default("closed").computed(
                vec![
                    DepPath::Local("pending_fold_state"),
                    DepPath::Local("server_fold_state"),
                ],
                fold_state,
            ),
            attr("has_seen_indicators").default(false).computed(
                vec![
                    DepPath::Local("model"),
                    DepPath::Local("is_mass_mailing"),
                    DepPath::Local("channel_type"),
                ],
                has_seen_indicators,
            ),
            attr("last_seen_by_current_partner_message_id").default(0).computed(
                vec![
                    DepPath::Local("known_last_seen_message_id"),
                    DepPath::Local("ordered_messages"),
                    DepPath::Via("ordered_messages", "id"),
                    DepPath::Via("ordered_messages", "author"),
                    DepPath::Via("ordered_messages", "is_transient"),
                ],
                last_seen_by_current_partner_message_id,
            ),
            attr("local_message_unread_counter").default(0).computed(
                vec![
                    DepPath::Local("server_message_unread_counter"),
                    DepPath::Local("server_last_message_id"),
                    DepPath::Local("last_seen_by_current_partner_message_id"),
                    DepPath::Local("ordered_messages"),
                    DepPath::Via("ordered_messages", "id"),
                ],
                local_message_unread_counter,
            ),
            attr("typing_status_text").default("").computed(
                vec![
                    DepPath::Local("ordered_other_typing_members"),
                    DepPath::Via("ordered_other_typing_members", "name_or_display_name"),
                ],
                typing_status_text,
            ),
            // derived proxies
            attr("correspondent_name_or_display_name")
                .related("correspondent", "name_or_display_name"),
        ],
    )
    .with_triggers(vec![
        TriggerModel::new(
            "sync_pending_pin",
            vec![DepPath::Local("is_server_pinned")],
            sync_pending_pin,
        ),
        TriggerModel::new(
            "sync_pending_fold",
            vec![DepPath::Local("server_fold_state")],
            sync_pending_fold,
        ),
        TriggerModel::new(
            "announce_last_seen_changed",
            vec![DepPath::Local("last_seen_by_current_partner_message_id")],
            announce_last_seen_changed,
        ),
    ])
}

/// Look up a thread by its `(model, id)` identity.
#[must_use]
pub fn by_identity(store: &Store, model: &str, id: i64) -> Option<RecordId> {
    store.lookup(&RecordIdentity {
        entity: "thread",
        key: vec![
            IdentityValue::Text(model.to_string()),
            IdentityValue::Int(id),
        ],
    })
}

///
/// Thread
///
/// Read-only accessor wrapper over `(&Store, RecordId)` for renderers and
/// tests. Never mutates; all writes go through actions.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Thread(pub RecordId);

impl Thread {
    #[must_use]
    pub fn server_id(self, store: &Store) -> i64 {
        store.value(self.0, "id").as_int().unwrap_or_default()
    }

    #[must_use]
    pub fn model_name(self, store: &Store) -> String {
        store
            .value(self.0, "model")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn is_channel(self, store: &Store) -> bool {
        store.value(self.0, "model").as_text() == Some(CHANNEL_MODEL)
    }

    #[must_use]
    pub fn display_name(self, store: &Store) -> String {
        store
            .value(self.0, "display_name")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn is_chat_channel(self, store: &Store) -> bool {
        store.value(self.0, "is_chat_channel").is_truthy()
    }

    #[must_use]
    pub fn is_pinned(self, store: &Store) -> bool {
        store.value(self.0, "is_pinned").is_truthy()
    }

    #[must_use]
    pub fn fold_state(self, store: &Store) -> FoldState {
        store
            .value(self.0, "fold_state")
            .as_text()
            .and_then(FoldState::parse)
            .unwrap_or(FoldState::Closed)
    }

    #[must_use]
    pub fn has_seen_indicators(self, store: &Store) -> bool {
        store.value(self.0, "has_seen_indicators").is_truthy()
    }

    #[must_use]
    pub fn local_message_unread_counter(self, store: &Store) -> i64 {
        store
            .value(self.0, "local_message_unread_counter")
            .as_int()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn last_seen_by_current_partner_message_id(self, store: &Store) -> i64 {
        store
            .value(self.0, "last_seen_by_current_partner_message_id")
            .as_int()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn typing_status_text(self, store: &Store) -> String {
        store
            .value(self.0, "typing_status_text")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn composer(self, store: &Store) -> Option<RecordId> {
        store.one(self.0, "composer")
    }

    #[must_use]
    pub fn correspondent(self, store: &Store) -> Option<RecordId> {
        store.one(self.0, "correspondent")
    }

    #[must_use]
    pub fn ordered_messages(self, store: &Store) -> Vec<RecordId> {
        store.ids(self.0, "ordered_messages").to_vec()
    }

    #[must_use]
    pub fn last_message(self, store: &Store) -> Option<RecordId> {
        store.one(self.0, "last_message")
    }

    #[must_use]
    pub fn message_after_new_message_separator(self, store: &Store) -> Option<RecordId> {
        store.one(self.0, "message_after_new_message_separator")
    }

    #[must_use]
    pub fn members(self, store: &Store) -> Vec<RecordId> {
        store.ids(self.0, "members").to_vec()
    }

    #[must_use]
    pub fn typing_members(self, store: &Store) -> Vec<RecordId> {
        store.ids(self.0, "typing_members").to_vec()
    }

    #[must_use]
    pub fn all_attachments(self, store: &Store) -> Vec<RecordId> {
        store.ids(self.0, "all_attachments").to_vec()
    }
}
