//! Mapping from `(encap, channel, hardware channel)` to stable interface ids.
//!
//! Each distinct combination seen while framing becomes one interface,
//! announced to the host through the [`InterfaceSink`] callback. Ids are
//! assigned monotonically from 0 and never change for the lifetime of the
//! reader; entries are never removed or rewritten.

use std::collections::HashMap;

use crate::types::{Encap, InterfaceDescription, InterfaceSink, SNAPLEN_STANDARD};

/// Sentinel channel value meaning "no hardware channel".
pub const NO_HW_CHANNEL: u16 = u16::MAX;

struct InterfaceEntry {
    #[allow(dead_code)]
    encap: Encap,
    #[allow(dead_code)]
    channel: u16,
    #[allow(dead_code)]
    hw_channel: u16,
    interface_id: u32,
}

pub(crate) struct InterfaceRegistry {
    entries: HashMap<u64, InterfaceEntry>,
    next_interface_id: u32,
    sink: Box<dyn InterfaceSink>,
}

fn key(encap: Encap, channel: u16, hw_channel: u16) -> u64 {
    ((encap.linktype() as u64) << 32) | ((hw_channel as u64) << 16) | channel as u64
}

fn default_name(encap: Encap, channel: u16, hw_channel: u16) -> String {
    match encap {
        Encap::Ethernet => {
            if hw_channel == NO_HW_CHANNEL {
                format!("ETH-{channel}")
            } else {
                format!("ETH-{channel}-{hw_channel}")
            }
        }
        Encap::Ieee80211 => format!("WLAN-{channel}"),
        Encap::FlexRay => format!("FR-{channel}"),
        Encap::Lin => format!("LIN-{channel}"),
        Encap::SocketCan => format!("CAN-{channel}"),
        _ => format!("ENCAP_{}-{}", encap.linktype(), channel),
    }
}

impl InterfaceRegistry {
    pub fn new(sink: Box<dyn InterfaceSink>) -> Self {
        Self {
            entries: HashMap::new(),
            next_interface_id: 0,
            sink,
        }
    }

    /// Return the id for the combination, creating and announcing a new
    /// interface on first sight. An explicit `name` overrides the default
    /// only when the interface is created by this call.
    pub fn lookup(
        &mut self,
        encap: Encap,
        channel: u16,
        hw_channel: u16,
        name: Option<&str>,
    ) -> u32 {
        let key = key(encap, channel, hw_channel);
        if let Some(entry) = self.entries.get(&key) {
            return entry.interface_id;
        }
        self.add(key, encap, channel, hw_channel, name)
    }

    fn add(
        &mut self,
        key: u64,
        encap: Encap,
        channel: u16,
        hw_channel: u16,
        name: Option<&str>,
    ) -> u32 {
        let name = name
            .map(str::to_owned)
            .unwrap_or_else(|| default_name(encap, channel, hw_channel));
        let interface_id = self.next_interface_id;
        self.next_interface_id += 1;

        log::debug!("registering interface {interface_id} ({name})");
        self.sink.register_interface(&InterfaceDescription {
            encap,
            name,
            // Per-record resolution can be coarser; the interface always
            // advertises the maximum (nanoseconds).
            time_units_per_second: 1_000_000_000,
            tsresol: 9,
            snaplen: SNAPLEN_STANDARD,
        });

        self.entries.insert(
            key,
            InterfaceEntry {
                encap,
                channel,
                hw_channel,
                interface_id,
            },
        );
        interface_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn registry_with_log() -> (InterfaceRegistry, Rc<RefCell<Vec<InterfaceDescription>>>) {
        let seen: Rc<RefCell<Vec<InterfaceDescription>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let registry = InterfaceRegistry::new(Box::new(move |d: &InterfaceDescription| {
            sink.borrow_mut().push(d.clone());
        }));
        (registry, seen)
    }

    #[test]
    fn ids_are_dense_and_stable() {
        let (mut registry, seen) = registry_with_log();

        assert_eq!(registry.lookup(Encap::SocketCan, 3, NO_HW_CHANNEL, None), 0);
        assert_eq!(registry.lookup(Encap::Ethernet, 1, NO_HW_CHANNEL, None), 1);
        assert_eq!(registry.lookup(Encap::SocketCan, 3, NO_HW_CHANNEL, None), 0);
        assert_eq!(registry.lookup(Encap::Ethernet, 1, 2, None), 2);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].name, "CAN-3");
        assert_eq!(seen[1].name, "ETH-1");
        assert_eq!(seen[2].name, "ETH-1-2");
        assert_eq!(seen[0].tsresol, 9);
        assert_eq!(seen[0].time_units_per_second, 1_000_000_000);
    }

    #[test]
    fn explicit_name_overrides_default() {
        let (mut registry, seen) = registry_with_log();
        registry.lookup(Encap::FlexRay, 0, NO_HW_CHANNEL, Some("Backbone"));
        // Name only applies at creation; later lookups reuse the entry.
        registry.lookup(Encap::FlexRay, 0, NO_HW_CHANNEL, Some("ignored"));
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "Backbone");
    }

    #[test]
    fn default_names_by_encap() {
        assert_eq!(default_name(Encap::Ieee80211, 2, NO_HW_CHANNEL), "WLAN-2");
        assert_eq!(default_name(Encap::Lin, 1, NO_HW_CHANNEL), "LIN-1");
        assert_eq!(default_name(Encap::FlexRay, 4, NO_HW_CHANNEL), "FR-4");
        assert_eq!(
            default_name(Encap::Unknown, 7, NO_HW_CHANNEL),
            "ENCAP_4294967295-7"
        );
    }

    #[test]
    fn key_distinguishes_hw_channel_and_encap() {
        let a = key(Encap::Ethernet, 1, NO_HW_CHANNEL);
        let b = key(Encap::Ethernet, 1, 0);
        let c = key(Encap::SocketCan, 1, NO_HW_CHANNEL);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
