use std::collections::hash_map::{Entry, IterMut};
use std::collections::HashMap;

use bytes::Bytes;
use log::info;

use crate::actors::Renderer;
use crate::source_validator::SourceValidator;

pub enum Lookup<'a> {
    /// The SSRC was unseen; its first payload has already been forwarded.
    Created,
    Existing(&'a mut SourceValidator),
}

#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: HashMap<u32, SourceValidator>,
}

impl SourceRegistry {
    pub fn lookup_or_create(
        &mut self,
        ssrc: u32,
        seq: u16,
        payload: &Bytes,
        renderer: &mut impl Renderer,
    ) -> Lookup<'_> {
        match self.sources.entry(ssrc) {
            Entry::Occupied(entry) => Lookup::Existing(entry.into_mut()),
            Entry::Vacant(entry) => {
                info!(target: "Source Registry", "New source ssrc:{} at seq:{}", ssrc, seq);
                entry.insert(SourceValidator::new(seq, payload.clone(), renderer));
                Lookup::Created
            }
        }
    }

    /// Validates a packet against its source, creating the source on first
    /// sight. Returns whether the payload was forwarded.
    pub fn accept(
        &mut self,
        ssrc: u32,
        seq: u16,
        payload: Bytes,
        renderer: &mut impl Renderer,
    ) -> bool {
        match self.lookup_or_create(ssrc, seq, &payload, renderer) {
            Lookup::Created => true,
            Lookup::Existing(validator) => validator.accept(seq, payload, renderer),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, u32, SourceValidator> {
        self.sources.iter_mut()
    }

    pub fn get(&self, ssrc: u32) -> Option<&SourceValidator> {
        self.sources.get(&ssrc)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod lookup_or_create {
    use bytes::Bytes;

    use crate::actors::testing::RecordingRenderer;
    use crate::source_registry::{Lookup, SourceRegistry};
    use crate::source_validator::ValidationState;

    #[test]
    fn unseen_ssrc_creates_source_and_forwards_payload() {
        let mut registry = SourceRegistry::default();
        let mut renderer = RecordingRenderer::default();
        let payload = Bytes::from_static(b"first");

        let lookup = registry.lookup_or_create(7, 300, &payload, &mut renderer);

        assert!(matches!(lookup, Lookup::Created));
        assert_eq!(registry.len(), 1);
        assert_eq!(renderer.queued(), vec![(payload, 300)]);
    }

    #[test]
    fn known_ssrc_returns_existing_source() {
        let mut registry = SourceRegistry::default();
        let mut renderer = RecordingRenderer::default();
        registry.lookup_or_create(7, 300, &Bytes::new(), &mut renderer);

        let lookup = registry.lookup_or_create(7, 301, &Bytes::new(), &mut renderer);

        match lookup {
            Lookup::Existing(validator) => {
                assert_eq!(validator.state(), ValidationState::Probation(1))
            }
            Lookup::Created => panic!("source should already exist"),
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(renderer.queued().len(), 1);
    }
}

#[cfg(test)]
mod accept {
    use bytes::Bytes;

    use crate::actors::testing::RecordingRenderer;
    use crate::source_registry::SourceRegistry;

    #[test]
    fn sources_are_validated_independently() {
        let mut registry = SourceRegistry::default();
        let mut renderer = RecordingRenderer::default();

        assert!(registry.accept(1, 10, Bytes::from_static(b"a"), &mut renderer));
        assert!(registry.accept(2, 5000, Bytes::from_static(b"b"), &mut renderer));
        assert!(registry.accept(1, 11, Bytes::from_static(b"c"), &mut renderer));
        assert!(registry.accept(2, 5001, Bytes::from_static(b"d"), &mut renderer));

        assert_eq!(registry.len(), 2);
        assert!(registry.get(1).is_some_and(|source| source.is_trusted()));
        assert!(registry.get(2).is_some_and(|source| source.is_trusted()));
        assert_eq!(
            renderer.queued().iter().map(|(_, seq)| *seq).collect::<Vec<u32>>(),
            vec![10, 5000, 11, 5001]
        );
    }

    #[test]
    fn rejected_packet_is_reported() {
        let mut registry = SourceRegistry::default();
        let mut renderer = RecordingRenderer::default();
        registry.accept(1, 10, Bytes::new(), &mut renderer);
        registry.accept(1, 11, Bytes::new(), &mut renderer);

        assert!(!registry.accept(1, 20_000, Bytes::new(), &mut renderer));
        assert_eq!(renderer.queued().len(), 2);
    }
}
