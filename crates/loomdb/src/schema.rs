use crate::{
    convert,
    entities::{attachment, composer, message, partner, seen_info, thread},
    error::Error,
};
use loomdb_core::{env::Env, model::Schema, store::RecordId, transport::Transport};

/// Build the full messaging schema. Fails only on a broken entity
/// declaration, which is a programmer error caught by the first test run.
pub fn messaging_schema() -> Result<Schema, Error> {
    let schema = Schema::new(vec![
        attachment::model(),
        composer::model(),
        message::model(),
        partner::model(),
        seen_info::model(),
        thread::model(),
    ])?;

    Ok(schema)
}

/// A fresh environment over the messaging schema and the given transport.
pub fn new_env(transport: Box<dyn Transport>) -> Result<Env, Error> {
    Ok(Env::new(messaging_schema()?, transport))
}

/// Insert the logged-in partner from its server payload and mark it as the
/// session's current partner.
pub fn init_current_partner(
    env: &mut Env,
    payload: &serde_json::Value,
) -> Result<RecordId, Error> {
    let patch = convert::partner_patch(payload)?;
    let id = env.insert("partner", patch)?;
    env.set_current_partner(Some(id));

    Ok(id)
}
