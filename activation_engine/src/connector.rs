//! Connectors - the pull side of a realizer.
//!
//! Each realizer owns one [`Connector`] mapping upstream symbols to pull
//! functions. Pulling never runs the upstream; it only reads the packet the
//! upstream last stored in its [`OutputCell`].

use construct_model::{ConstructSymbol, LinkTiming, Packet};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::EngineError;

/// Result of pulling one upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Pulled {
    /// The upstream has not produced output yet (or no longer exists).
    Pending,
    /// The upstream's stored packet, shared, never copied.
    Ready(Rc<Packet>),
}

impl Pulled {
    pub fn packet(&self) -> Option<&Packet> {
        match self {
            Pulled::Ready(packet) => Some(packet),
            Pulled::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Pulled::Pending)
    }
}

/// A zero-argument function yielding an upstream's current output.
pub type PullFn = Rc<dyn Fn() -> Pulled>;

/// Everything a realizer pulled for one propagation step, in symbol order.
pub type InputBundle = BTreeMap<ConstructSymbol, Pulled>;

#[derive(Debug, Clone, Default)]
struct Slots {
    current: Option<Rc<Packet>>,
    previous: Option<Rc<Packet>>,
}

/// Storage for a realizer's most recent output.
///
/// The cell keeps the output of the current pass and, after [`OutputCell::latch`],
/// the output of the previous one, which lagged links read.
#[derive(Debug, Clone, Default)]
pub struct OutputCell(Rc<RefCell<Slots>>);

impl OutputCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently stored packet.
    pub fn get(&self) -> Option<Rc<Packet>> {
        self.0.borrow().current.clone()
    }

    /// The packet stored before the last latch.
    pub fn previous(&self) -> Option<Rc<Packet>> {
        self.0.borrow().previous.clone()
    }

    /// Replace the stored packet. Readers holding the old one keep it.
    pub fn set(&self, packet: Packet) -> Rc<Packet> {
        let packet = Rc::new(packet);
        self.0.borrow_mut().current = Some(Rc::clone(&packet));
        packet
    }

    /// Start a new pass: the current output becomes the previous one.
    pub fn latch(&self) {
        let mut slots = self.0.borrow_mut();
        slots.previous = slots.current.clone();
    }

    /// Forget every stored packet.
    pub fn clear(&self) {
        let mut slots = self.0.borrow_mut();
        slots.current = None;
        slots.previous = None;
    }

    /// Record both slots so a failed pass can put them back.
    pub(crate) fn save(&self) -> SavedCell {
        SavedCell(self.0.borrow().clone())
    }

    pub(crate) fn restore(&self, saved: SavedCell) {
        *self.0.borrow_mut() = saved.0;
    }

    /// A pull function reading this cell with the given timing.
    ///
    /// The function holds a weak reference: once the owning realizer is
    /// dropped it yields [`Pulled::Pending`].
    pub fn puller(&self, timing: LinkTiming) -> PullFn {
        let slots: Weak<RefCell<Slots>> = Rc::downgrade(&self.0);

        Rc::new(move || {
            let Some(slots) = slots.upgrade() else {
                return Pulled::Pending;
            };
            let slots = slots.borrow();
            let packet = match timing {
                LinkTiming::SamePass => slots.current.clone(),
                LinkTiming::Lagged => slots.previous.clone(),
            };
            packet.map_or(Pulled::Pending, Pulled::Ready)
        })
    }
}

/// Contents of an [`OutputCell`] at some point in time.
#[derive(Debug, Clone)]
pub(crate) struct SavedCell(Slots);

/// The set of upstream links of one realizer.
pub struct Connector {
    owner: ConstructSymbol,
    links: BTreeMap<ConstructSymbol, PullFn>,
}

impl Connector {
    /// Create an empty connector for the realizer named `owner`.
    pub fn new(owner: ConstructSymbol) -> Self {
        Self {
            owner,
            links: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> &ConstructSymbol {
        &self.owner
    }

    /// Register a pull function for `upstream`.
    ///
    /// Re-adding an existing link is an error, not a no-op, so wiring bugs
    /// surface immediately.
    pub fn add_link(&mut self, upstream: ConstructSymbol, pull: PullFn) -> Result<(), EngineError> {
        if self.links.contains_key(&upstream) {
            return Err(EngineError::DuplicateLink {
                target: self.owner.clone(),
                upstream,
            });
        }

        tracing::trace!(target_symbol = %self.owner, upstream = %upstream, "link added");
        self.links.insert(upstream, pull);
        Ok(())
    }

    /// Remove the link to `upstream`.
    pub fn drop_link(&mut self, upstream: &ConstructSymbol) -> Result<(), EngineError> {
        if self.discard_link(upstream) {
            Ok(())
        } else {
            Err(EngineError::UnknownLink {
                target: self.owner.clone(),
                upstream: upstream.clone(),
            })
        }
    }

    /// Remove the link to `upstream` if there is one. Returns whether a link
    /// was removed.
    pub fn discard_link(&mut self, upstream: &ConstructSymbol) -> bool {
        let removed = self.links.remove(upstream).is_some();
        if removed {
            tracing::trace!(target_symbol = %self.owner, upstream = %upstream, "link dropped");
        }
        removed
    }

    /// Remove every link.
    pub fn clear(&mut self) {
        self.links.clear();
    }

    /// Invoke every pull function.
    pub fn pull(&self) -> InputBundle {
        self.links
            .iter()
            .map(|(upstream, pull)| (upstream.clone(), pull()))
            .collect()
    }

    pub fn is_linked(&self, upstream: &ConstructSymbol) -> bool {
        self.links.contains_key(upstream)
    }

    /// Linked upstream symbols, in order.
    pub fn sources(&self) -> impl Iterator<Item = &ConstructSymbol> {
        self.links.keys()
    }

    /// Linked upstream symbols with their pull functions.
    pub fn links(&self) -> impl Iterator<Item = (&ConstructSymbol, &PullFn)> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("owner", &self.owner)
            .field("links", &self.links.keys().collect::<Vec<_>>())
            .finish()
    }
}
