//! Update path for existing templates.
//!
//! Validates the record, confirms the id already names a template in the live
//! store, merges the pending sections into the live node, and submits the
//! merged node through the store's whole-object replace. Every failure comes
//! back as `RecordErrors`; nothing is raised past this boundary.

use crate::document::Element;
use crate::error::RecordErrors;
use crate::store::{LiveStore, does_not_exist};
use crate::template::{Template, merge_template};
use tracing::{debug, warn};

/// Commits `template` and returns the node as submitted.
pub fn commit(template: &Template, store: &dyn LiveStore) -> Result<Element, RecordErrors> {
    let errors = template.validate();
    if !errors.is_empty() {
        return Err(errors);
    }

    let kind = template.kind_of_record();
    match store.exists(&template.id, kind) {
        Ok(true) => {}
        Ok(false) => return Err(RecordErrors::from(does_not_exist(&template.id))),
        Err(err) => {
            warn!(id = %template.id, error = %err, "existence probe failed");
            return Err(RecordErrors::from(err));
        }
    }

    let submitted = store.fetch(&template.id, kind).and_then(|mut node| {
        merge_template(&mut node, template);
        debug!(id = %template.id, "submitting merged template");
        store.replace(&node).map(|_| node)
    });

    submitted.map_err(|err| {
        warn!(id = %template.id, error = %err, "template update rejected");
        let mut errors = RecordErrors::new();
        errors.add_base(err.to_string());
        errors
    })
}
