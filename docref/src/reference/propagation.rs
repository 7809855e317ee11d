use crate::collection::{set, Document};
use crate::common::SubscriberRef;
use crate::dispatch::{
    event_name, AfterEventInfo, Dispatcher, Operation, Payload, RefreshParams, UpdateParams,
};
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::filter::field;
use crate::reference::generator::project;
use crate::reference::ReferenceDescriptor;

/// Keeps one reference cache of an owning entity in step with replaces of
/// the referenced entity.
///
/// Registered as an after listener on `entity.<RefEntity>.replaceOne`. When
/// a referenced document is replaced, owners holding its id directly get
/// their cache overwritten with a projection of the replacement through the
/// owner's `updateMany`. Owners holding it inside an id array are refreshed
/// through the owner's `refreshRefCache`, restricted to the referenced
/// entity.
///
/// Propagation never fails the replace that triggered it. Errors surface on
/// the dispatcher's failure channel as [ErrorKind::PropagationError].
#[derive(Clone, Debug)]
pub struct ReplacePropagation {
    owner_entity: String,
    descriptor: ReferenceDescriptor,
}

impl ReplacePropagation {
    pub fn new(owner_entity: &str, descriptor: ReferenceDescriptor) -> DocrefResult<Self> {
        if !descriptor.has_cache() {
            log::error!(
                "Reference {} of {} has no cache to propagate",
                descriptor.ref_id,
                owner_entity
            );
            return Err(DocrefError::new(
                &format!(
                    "Reference {} of {} has no cache to propagate",
                    descriptor.ref_id, owner_entity
                ),
                ErrorKind::ConfigurationError,
            ));
        }

        Ok(ReplacePropagation {
            owner_entity: owner_entity.to_string(),
            descriptor,
        })
    }

    /// The event this listener reacts to.
    pub fn trigger(&self) -> String {
        event_name(&self.descriptor.ref_entity, Operation::ReplaceOne)
    }

    pub fn register(self, dispatcher: &Dispatcher) -> DocrefResult<SubscriberRef> {
        let trigger = self.trigger();
        log::debug!(
            "Propagating {} replaces into {} of {}",
            self.descriptor.ref_entity,
            self.descriptor.cache_under().unwrap_or_default(),
            self.owner_entity
        );
        dispatcher.on_after(&trigger, move |info| self.on_replaced(info))
    }

    fn on_replaced(&self, info: &AfterEventInfo) -> DocrefResult<()> {
        let replaced = match info.result() {
            Payload::Document(replaced) => replaced,
            _ => {
                log::debug!("{} replaced nothing, no propagation", info.event());
                return Ok(());
            }
        };

        self.propagate(info.dispatcher(), replaced).map_err(|e| {
            log::error!(
                "Failed to propagate {} replace into {}: {}",
                self.descriptor.ref_entity,
                self.owner_entity,
                e
            );
            DocrefError::new_with_cause(
                &format!(
                    "Failed to propagate {} replace into {}",
                    self.descriptor.ref_entity, self.owner_entity
                ),
                ErrorKind::PropagationError,
                e,
            )
        })
    }

    /// Pushes the new state of `replaced` into every owning document.
    ///
    /// Both dispatches happen on every replace, so a reference that only
    /// ever holds single ids still pays for one `refreshRefCache` scan of the
    /// owning collection. That scan matches array members only, and with no
    /// match it writes nothing.
    pub fn propagate(&self, dispatcher: &Dispatcher, replaced: &Document) -> DocrefResult<()> {
        let id = replaced.get(&self.descriptor.remote_key)?;
        if !id.is_id_like() {
            log::warn!(
                "Replaced {} has no usable {}, nothing to propagate",
                self.descriptor.ref_entity,
                self.descriptor.remote_key
            );
            return Ok(());
        }

        let under = match self.descriptor.cache_under() {
            Some(under) => under,
            None => return Ok(()),
        };

        let projection = project(replaced, self.descriptor.cache_properties())?;
        let params = UpdateParams::new(
            field(&self.descriptor.ref_id).eq(id.clone()),
            set(under, projection),
        );
        let updated = dispatcher
            .dispatch(
                &event_name(&self.owner_entity, Operation::UpdateMany),
                Payload::Update(params),
            )?
            .into_update_result()?;

        let refresh = RefreshParams::new(field(&self.descriptor.ref_id).contains(id))
            .for_entities(&[self.descriptor.ref_entity.as_str()]);
        let refreshed = dispatcher
            .dispatch(
                &event_name(&self.owner_entity, Operation::RefreshRefCache),
                Payload::Refresh(refresh),
            )?
            .into_bulk_write()?;

        log::debug!(
            "Propagated {} replace into {}: {} direct, {} in arrays",
            self.descriptor.ref_entity,
            self.owner_entity,
            updated.modified,
            refreshed.modified
        );
        Ok(())
    }
}
