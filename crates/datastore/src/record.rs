//! The hierarchical record the engine reads desired state from.
//!
//! A record is a tree: groups have named children, and leaves ("atomics") carry a string value.  Names may repeat, which
//! is how repeatable sub-relations such as parent links are expressed.  The engine only needs the three accessors on
//! [Record]; [DataGroup] is the in-memory implementation.

pub trait Record {
    /// Is there any child, group or atomic, with this name?
    fn has_child(&self, name: &str) -> bool;

    /// The value of the first atomic child with this name.
    fn first_value(&self, name: &str) -> Option<&str>;

    /// Every group child with this name, in order.
    fn all_groups(&self, name: &str) -> Vec<&Self>;

    /// The first group child with this name.
    fn first_group(&self, name: &str) -> Option<&Self> {
        self.all_groups(name).into_iter().next()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataGroup {
    name: String,
    value: Option<String>,
    children: Vec<DataGroup>,
}

impl DataGroup {
    pub fn group(name: impl Into<String>) -> Self {
        DataGroup {
            name: name.into(),
            value: None,
            children: vec![],
        }
    }

    pub fn atomic(name: impl Into<String>, value: impl Into<String>) -> Self {
        DataGroup {
            name: name.into(),
            value: Some(value.into()),
            children: vec![],
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_atomic(&self) -> bool {
        self.value.is_some()
    }

    pub fn add_child(&mut self, child: DataGroup) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: DataGroup) -> Self {
        self.add_child(child);
        self
    }

    pub fn with_atomic(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_child(DataGroup::atomic(name, value))
    }

    /// Build a record from JSON.
    ///
    /// Objects become groups, arrays become repeated children sharing the array's key, and strings, numbers and
    /// booleans become atomics.  Nulls are dropped.  The top-level value must be an object.
    pub fn from_json(name: impl Into<String>, json: &serde_json::Value) -> anyhow::Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("Records must be JSON objects"))?;
        let mut group = DataGroup::group(name);
        for (key, value) in object.iter() {
            push_json_children(&mut group, key, value)?;
        }
        Ok(group)
    }
}

fn push_json_children(
    parent: &mut DataGroup,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    use serde_json::Value;

    match value {
        Value::Null => {}
        Value::String(s) => parent.add_child(DataGroup::atomic(key, s.as_str())),
        Value::Number(n) => parent.add_child(DataGroup::atomic(key, n.to_string())),
        Value::Bool(b) => parent.add_child(DataGroup::atomic(key, b.to_string())),
        Value::Object(_) => parent.add_child(DataGroup::from_json(key, value)?),
        Value::Array(items) => {
            for i in items.iter() {
                if i.is_array() {
                    anyhow::bail!("{}: nested arrays have no record equivalent", key);
                }
                push_json_children(parent, key, i)?;
            }
        }
    }

    Ok(())
}

impl Record for DataGroup {
    fn has_child(&self, name: &str) -> bool {
        self.children.iter().any(|c| c.name == name)
    }

    fn first_value(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .filter(|c| c.name == name)
            .find_map(|c| c.get_value())
    }

    fn all_groups(&self, name: &str) -> Vec<&Self> {
        self.children
            .iter()
            .filter(|c| c.name == name && !c.is_atomic())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let record = DataGroup::group("organisation")
            .with_atomic("organisationName", "Uppsala universitet")
            .with_child(DataGroup::group("parentOrganisation").with_atomic("x", "1"))
            .with_child(DataGroup::group("parentOrganisation").with_atomic("x", "2"));

        assert!(record.has_child("organisationName"));
        assert!(!record.has_child("URL"));
        assert_eq!(
            record.first_value("organisationName"),
            Some("Uppsala universitet")
        );
        assert_eq!(record.first_value("parentOrganisation"), None);

        let parents = record.all_groups("parentOrganisation");
        assert_eq!(parents.len(), 2);
        assert_eq!(parents[1].first_value("x"), Some("2"));
        assert!(record.all_groups("organisationName").is_empty());
        assert_eq!(record.first_group("parentOrganisation"), Some(parents[0]));
    }

    #[test]
    fn from_json() {
        let json = serde_json::json!({
            "organisationName": "Uppsala universitet",
            "eligible": true,
            "postcode": 75105,
            "URL": null,
            "parentOrganisation": [
                { "organisationLink": { "linkedRecordId": "10" } },
                { "organisationLink": { "linkedRecordId": "20" } },
            ],
        });
        let record = DataGroup::from_json("organisation", &json).unwrap();

        assert_eq!(record.first_value("eligible"), Some("true"));
        assert_eq!(record.first_value("postcode"), Some("75105"));
        assert!(!record.has_child("URL"));
        let ids = record
            .all_groups("parentOrganisation")
            .into_iter()
            .filter_map(|g| g.first_group("organisationLink"))
            .filter_map(|l| l.first_value("linkedRecordId"))
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["10", "20"]);
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(DataGroup::from_json("x", &serde_json::json!("text")).is_err());
        assert!(DataGroup::from_json("x", &serde_json::json!({ "a": [[1]] })).is_err());
    }
}
