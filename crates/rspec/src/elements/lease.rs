use crate::model::Lease;
use crate::xml::XmlElement;

/// How a dialect lays out `<lease>` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseLayout {
    /// One `<lease slice_id start_time duration>` per time slot, with one
    /// `<node component_id>` child per reserved component (SFA family).
    Grouped,
    /// One `<lease lease_id component_id slice_id start_time duration/>` per
    /// reserved component (GENI v3).
    Flat,
}

fn parse_u64(el: &XmlElement, key: &str) -> u64 {
    el.attr(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_default()
}

impl LeaseLayout {
    /// Both layouts decode through the same path: a `component_id`
    /// attribute and any number of `<node>` children each yield one lease.
    pub fn decode(&self, el: &XmlElement) -> Vec<Lease> {
        let base = Lease {
            lease_id: el.attr_string("lease_id"),
            component_id: String::new(),
            slice_id: el.attr("slice_id").unwrap_or_default().to_string(),
            start_time: parse_u64(el, "start_time"),
            duration: parse_u64(el, "duration"),
        };
        let mut leases = Vec::new();
        if let Some(component_id) = el.attr_string("component_id") {
            leases.push(Lease {
                component_id,
                ..base.clone()
            });
        }
        for node in el.children_named("node") {
            if let Some(component_id) = node.attr_string("component_id") {
                leases.push(Lease {
                    component_id,
                    ..base.clone()
                });
            }
        }
        leases
    }

    pub fn encode(&self, leases: &[Lease]) -> Vec<XmlElement> {
        match self {
            LeaseLayout::Flat => leases
                .iter()
                .map(|lease| {
                    XmlElement::new("lease")
                        .with_opt_attr("lease_id", lease.lease_id.as_deref())
                        .with_attr("component_id", lease.component_id.as_str())
                        .with_attr("slice_id", lease.slice_id.as_str())
                        .with_attr("start_time", lease.start_time.to_string())
                        .with_attr("duration", lease.duration.to_string())
                })
                .collect(),
            LeaseLayout::Grouped => {
                let mut groups: Vec<XmlElement> = Vec::new();
                let mut keys: Vec<(String, u64, u64)> = Vec::new();
                for lease in leases {
                    let key = (lease.slice_id.clone(), lease.start_time, lease.duration);
                    let idx = match keys.iter().position(|k| *k == key) {
                        Some(idx) => idx,
                        None => {
                            keys.push(key);
                            groups.push(
                                XmlElement::new("lease")
                                    .with_opt_attr("lease_id", lease.lease_id.as_deref())
                                    .with_attr("slice_id", lease.slice_id.as_str())
                                    .with_attr("start_time", lease.start_time.to_string())
                                    .with_attr("duration", lease.duration.to_string()),
                            );
                            groups.len() - 1
                        }
                    };
                    groups[idx].push(
                        XmlElement::new("node").with_attr("component_id", lease.component_id.as_str()),
                    );
                }
                groups
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease(component: &str, start: u64) -> Lease {
        Lease {
            lease_id: None,
            component_id: component.to_string(),
            slice_id: "urn:publicid:IDN+plc+slice+s1".to_string(),
            start_time: start,
            duration: 2,
        }
    }

    #[test]
    fn grouped_layout_shares_time_slots() {
        let leases = vec![lease("n1", 1000), lease("n2", 1000), lease("n3", 2000)];
        let encoded = LeaseLayout::Grouped.encode(&leases);
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[0].children_named("node").count(), 2);
        let decoded: Vec<Lease> = encoded
            .iter()
            .flat_map(|el| LeaseLayout::Grouped.decode(el))
            .collect();
        assert_eq!(decoded, leases);
    }

    #[test]
    fn flat_layout_is_one_element_per_component() {
        let leases = vec![lease("n1", 1000), lease("n2", 1000)];
        let encoded = LeaseLayout::Flat.encode(&leases);
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[1].attr("component_id"), Some("n2"));
        assert_eq!(LeaseLayout::Flat.decode(&encoded[0]), vec![leases[0].clone()]);
    }
}
