//! Pure diff between the entry points routers want and those running.
//!
//! No sockets are touched here; the factory applies the plan.

use std::collections::BTreeSet;

use crate::config::DynamicConfig;
use crate::entrypoint::{EntryPointDefinition, EntryPoints, MalformedEntryPointName, Transport};

/// Entry point names referenced by routers, per protocol family.
///
/// The TCP family gathers HTTP and TCP routers; the UDP family gathers
/// UDP routers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WantedEntryPoints {
    pub tcp: BTreeSet<String>,
    pub udp: BTreeSet<String>,
}

impl WantedEntryPoints {
    /// Scan HTTP, then TCP, then UDP routers, each in router-name order.
    pub fn collect(config: &DynamicConfig) -> Self {
        let mut wanted = Self::default();
        for router in config.http.routers.values() {
            wanted.tcp.extend(router.entry_points.iter().cloned());
        }
        for router in config.tcp.routers.values() {
            wanted.tcp.extend(router.entry_points.iter().cloned());
        }
        for router in config.udp.routers.values() {
            wanted.udp.extend(router.entry_points.iter().cloned());
        }
        wanted
    }

    fn families(&self) -> impl Iterator<Item = (Transport, &String)> {
        self.tcp
            .iter()
            .map(|n| (Transport::Tcp, n))
            .chain(self.udp.iter().map(|n| (Transport::Udp, n)))
    }
}

/// Names currently owned by the factory.
#[derive(Debug, Clone, Default)]
pub struct CurrentEntryPoints {
    pub static_names: BTreeSet<String>,
    pub dynamic_tcp: BTreeSet<String>,
    pub dynamic_udp: BTreeSet<String>,
}

impl CurrentEntryPoints {
    fn dynamic(&self, transport: Transport) -> &BTreeSet<String> {
        match transport {
            Transport::Tcp => &self.dynamic_tcp,
            Transport::Udp => &self.dynamic_udp,
        }
    }
}

/// Outcome of classifying every wanted and running name.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Running dynamic listeners to leave untouched.
    pub kept_tcp: BTreeSet<String>,
    pub kept_udp: BTreeSet<String>,
    /// Freshly synthesized definitions, defaults not yet applied.
    pub new: EntryPoints,
    /// Running dynamic listeners no router references any more.
    pub removed_tcp: Vec<String>,
    pub removed_udp: Vec<String>,
    /// Names that could not be synthesized.
    pub skipped: Vec<(String, MalformedEntryPointName)>,
}

impl ReconcilePlan {
    pub fn compute(wanted: &WantedEntryPoints, current: &CurrentEntryPoints) -> Self {
        let mut plan = Self::default();

        for (family, name) in wanted.families() {
            if current.static_names.contains(name) {
                continue;
            }
            if current.dynamic(family).contains(name) {
                plan.kept(family).insert(name.clone());
                continue;
            }

            match synthesize_for(name, family) {
                Ok(definition) => {
                    plan.new.insert(name.clone(), definition);
                }
                Err(reason) => plan.skipped.push((name.clone(), reason)),
            }
        }

        // Two passes: removals are computed here, applied by the caller.
        plan.removed_tcp = current
            .dynamic_tcp
            .iter()
            .filter(|n| !plan.kept_tcp.contains(*n) && !plan.new.contains_key(*n))
            .cloned()
            .collect();
        plan.removed_udp = current
            .dynamic_udp
            .iter()
            .filter(|n| !plan.kept_udp.contains(*n) && !plan.new.contains_key(*n))
            .cloned()
            .collect();

        plan
    }

    fn kept(&mut self, transport: Transport) -> &mut BTreeSet<String> {
        match transport {
            Transport::Tcp => &mut self.kept_tcp,
            Transport::Udp => &mut self.kept_udp,
        }
    }

    /// True when applying the plan changes nothing.
    pub fn is_noop(&self) -> bool {
        self.new.is_empty() && self.removed_tcp.is_empty() && self.removed_udp.is_empty()
    }
}

fn synthesize_for(name: &str, family: Transport) -> Result<EntryPointDefinition, MalformedEntryPointName> {
    let definition = EntryPointDefinition::synthesize(name)?;
    if definition.transport_kind() != family {
        return Err(MalformedEntryPointName::TransportMismatch {
            transport: definition.transport_kind(),
            family,
        });
    }
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpRouter, TcpRouter, UdpRouter};

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn config(http: &[&str], tcp: &[&str], udp: &[&str]) -> DynamicConfig {
        let mut config = DynamicConfig::default();
        if !http.is_empty() {
            config.http.routers.insert(
                "h".into(),
                HttpRouter {
                    entry_points: http.iter().map(|s| s.to_string()).collect(),
                    ..Default::default()
                },
            );
        }
        if !tcp.is_empty() {
            config.tcp.routers.insert(
                "t".into(),
                TcpRouter {
                    entry_points: tcp.iter().map(|s| s.to_string()).collect(),
                    ..Default::default()
                },
            );
        }
        if !udp.is_empty() {
            config.udp.routers.insert(
                "u".into(),
                UdpRouter {
                    entry_points: udp.iter().map(|s| s.to_string()).collect(),
                    ..Default::default()
                },
            );
        }
        config
    }

    #[test]
    fn collect_groups_by_family() {
        let wanted = WantedEntryPoints::collect(&config(&["web", "http-1"], &["tcp-2", "http-1"], &["udp-3"]));
        assert_eq!(wanted.tcp, names(&["http-1", "tcp-2", "web"]));
        assert_eq!(wanted.udp, names(&["udp-3"]));
    }

    #[test]
    fn classifies_new_kept_removed_and_skipped() {
        let wanted = WantedEntryPoints::collect(&config(
            &["web", "http-30001", "bogus"],
            &["tcp-30002", "ftp-8080"],
            &["udp-30004", "http-999999"],
        ));
        let current = CurrentEntryPoints {
            static_names: names(&["web"]),
            dynamic_tcp: names(&["tcp-30002", "tcp-30003"]),
            dynamic_udp: names(&["udp-30005"]),
        };

        let plan = ReconcilePlan::compute(&wanted, &current);

        assert_eq!(plan.kept_tcp, names(&["tcp-30002"]));
        assert!(plan.kept_udp.is_empty());
        assert_eq!(plan.new.keys().cloned().collect::<BTreeSet<_>>(), names(&["http-30001", "udp-30004"]));
        assert_eq!(plan.removed_tcp, vec!["tcp-30003".to_string()]);
        assert_eq!(plan.removed_udp, vec!["udp-30005".to_string()]);

        let skipped: BTreeSet<_> = plan.skipped.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(skipped, names(&["bogus", "ftp-8080", "http-999999"]));
    }

    #[test]
    fn static_names_are_never_planned() {
        let wanted = WantedEntryPoints::collect(&config(&["http-8080"], &[], &["udp-53"]));
        let current = CurrentEntryPoints {
            static_names: names(&["http-8080", "udp-53"]),
            ..Default::default()
        };

        let plan = ReconcilePlan::compute(&wanted, &current);
        assert!(plan.is_noop());
        assert!(plan.kept_tcp.is_empty() && plan.kept_udp.is_empty());
    }

    #[test]
    fn transport_must_match_family() {
        let wanted = WantedEntryPoints::collect(&config(&["udp-5000"], &[], &["tcp-5001"]));
        let plan = ReconcilePlan::compute(&wanted, &CurrentEntryPoints::default());

        assert!(plan.new.is_empty());
        assert_eq!(plan.skipped.len(), 2);
        assert!(plan
            .skipped
            .iter()
            .all(|(_, reason)| matches!(reason, MalformedEntryPointName::TransportMismatch { .. })));
    }

    #[test]
    fn unchanged_config_is_noop() {
        let wanted = WantedEntryPoints::collect(&config(&["http-30001"], &["tcp-30002"], &["udp-30004"]));
        let current = CurrentEntryPoints {
            static_names: BTreeSet::new(),
            dynamic_tcp: names(&["http-30001", "tcp-30002"]),
            dynamic_udp: names(&["udp-30004"]),
        };

        let plan = ReconcilePlan::compute(&wanted, &current);
        assert!(plan.is_noop());
        assert_eq!(plan.kept_tcp.len(), 2);
        assert_eq!(plan.kept_udp.len(), 1);
    }
}
