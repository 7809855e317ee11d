/// Flags controlling an update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    insert_if_absent: bool,
    just_once: bool,
}

impl UpdateOptions {
    pub fn new(insert_if_absent: bool, just_once: bool) -> Self {
        Self {
            insert_if_absent,
            just_once,
        }
    }

    /// Insert a document built from the update when nothing matches.
    pub fn is_insert_if_absent(&self) -> bool {
        self.insert_if_absent
    }

    /// Update at most one matching document.
    pub fn is_just_once(&self) -> bool {
        self.just_once
    }
}

pub fn insert_if_absent() -> UpdateOptions {
    UpdateOptions::new(true, false)
}

pub fn just_once() -> UpdateOptions {
    UpdateOptions::new(false, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_options_default() {
        let options = UpdateOptions::default();
        assert!(!options.is_insert_if_absent());
        assert!(!options.is_just_once());
    }

    #[test]
    fn test_helpers() {
        assert!(insert_if_absent().is_insert_if_absent());
        assert!(just_once().is_just_once());
        assert!(!just_once().is_insert_if_absent());
    }
}
