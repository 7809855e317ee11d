use crate::collection::Document;
use crate::reference::ReferenceDescriptor;

/// Checks whether saving `document` needs a cache generation.
///
/// True when at least one caching descriptor has its reference set on the
/// document while its cache path is still empty. A document re-saved with its
/// cache already embedded needs no fetch.
pub fn should_generate(document: &Document, descriptors: &[ReferenceDescriptor]) -> bool {
    should_generate_with(document, descriptors, &[])
}

/// Like [should_generate], but a descriptor whose `ref_id` is listed in
/// `changed` qualifies even when its cache path is populated.
pub fn should_generate_with(
    document: &Document,
    descriptors: &[ReferenceDescriptor],
    changed: &[String],
) -> bool {
    descriptors
        .iter()
        .filter(|descriptor| descriptor.has_cache())
        .any(|descriptor| {
            if !document.is_populated(&descriptor.ref_id) {
                return false;
            }

            if changed.contains(&descriptor.ref_id) {
                log::debug!(
                    "Reference {} changed, cache generation required",
                    descriptor.ref_id
                );
                return true;
            }

            match descriptor.cache_under() {
                Some(under) if !document.is_populated(under) => {
                    log::debug!(
                        "Cache {} of reference {} is empty, cache generation required",
                        under,
                        descriptor.ref_id
                    );
                    true
                }
                _ => false,
            }
        })
}
