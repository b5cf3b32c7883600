//! Version registry: the set of enabled dialects and the rules that map a
//! requested `(type, version, content_type)` triple, or a parsed document,
//! onto one adapter.

use std::sync::Arc;

use serde::Serialize;

use crate::error::RSpecError;
use crate::versions::{
    ContentType, GeniV3, IotlabV1, NitosV1, OfeliaV1, PgV2, RSpecVersion, SfaV1, VersionRequest,
    VersionSpec,
};
use crate::xml::XmlElement;

// ──────────────────────────────────────────────
// AdvertisedVersion
// ──────────────────────────────────────────────

/// One entry of the `geni_ad_rspec_versions` / `geni_request_rspec_versions`
/// lists in a GetVersion response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvertisedVersion {
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: String,
    pub schema: Option<String>,
    pub namespace: Option<String>,
    pub extensions: Vec<String>,
}

// ──────────────────────────────────────────────
// VersionRegistry
// ──────────────────────────────────────────────

/// Adapters are stateless; the registry hands out shared `Arc`s and is
/// itself immutable once built, so it can be shared across tasks freely.
#[derive(Debug, Clone)]
pub struct VersionRegistry {
    adapters: Vec<Arc<dyn RSpecVersion>>,
    default: VersionRequest,
}

impl VersionRegistry {
    pub fn new(default: VersionRequest) -> Self {
        VersionRegistry {
            adapters: Vec::new(),
            default,
        }
    }

    /// Every shipped dialect, defaulting to GENI 3.
    pub fn builtin() -> Self {
        let mut registry = VersionRegistry::new(VersionRequest::new("GENI", "3"));
        registry.register(Arc::new(SfaV1::new()));
        for content_type in [ContentType::Ad, ContentType::Request, ContentType::Manifest] {
            registry.register(Arc::new(PgV2::new(content_type)));
            registry.register(Arc::new(GeniV3::new(content_type)));
        }
        registry.register(Arc::new(IotlabV1::new()));
        registry.register(Arc::new(NitosV1::new()));
        registry.register(Arc::new(OfeliaV1::new()));
        registry
    }

    /// Register an adapter, replacing any adapter with the same identity.
    pub fn register(&mut self, adapter: Arc<dyn RSpecVersion>) {
        let spec = adapter.spec().clone();
        self.adapters.retain(|a| a.spec() != &spec);
        tracing::debug!(
            dialect = %spec,
            content_type = spec.content_label(),
            "registered rspec version"
        );
        self.adapters.push(adapter);
    }

    /// Keep only the dialects named in `enabled`.
    pub fn retain(&mut self, enabled: &[VersionRequest]) {
        self.adapters.retain(|a| {
            enabled
                .iter()
                .any(|e| a.spec().is(&e.type_name, &e.version))
        });
    }

    /// Change the default dialect. It must already be registered.
    pub fn set_default(&mut self, default: VersionRequest) -> Result<(), RSpecError> {
        self.get_version(Some(&default))?;
        self.default = default;
        Ok(())
    }

    pub fn default_request(&self) -> &VersionRequest {
        &self.default
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn RSpecVersion>> {
        self.adapters.iter()
    }

    /// The canonical identity of the requested dialect (or of the default
    /// when `request` is `None`). An unregistered pair is an error; no other
    /// dialect is substituted.
    pub fn get_version(&self, request: Option<&VersionRequest>) -> Result<VersionSpec, RSpecError> {
        let request = request.unwrap_or(&self.default);
        self.adapters
            .iter()
            .find(|a| a.spec().is(&request.type_name, &request.version))
            .map(|a| VersionSpec::new(&a.spec().type_name, &a.spec().version, None))
            .ok_or_else(|| {
                RSpecError::unknown_version(&request.type_name, &request.version, "*")
            })
    }

    /// Exact `(type, version, content_type)` first, then the `'*'` adapter
    /// for `(type, version)`.
    pub fn resolve(
        &self,
        type_name: &str,
        version: &str,
        content_type: ContentType,
    ) -> Result<Arc<dyn RSpecVersion>, RSpecError> {
        let candidates: Vec<&Arc<dyn RSpecVersion>> = self
            .adapters
            .iter()
            .filter(|a| a.spec().is(type_name, version))
            .collect();
        candidates
            .iter()
            .find(|a| a.spec().content_type == Some(content_type))
            .or_else(|| candidates.iter().find(|a| a.spec().content_type.is_none()))
            .map(|a| Arc::clone(a))
            .ok_or_else(|| RSpecError::unknown_version(type_name, version, content_type.as_str()))
    }

    pub fn resolve_request(
        &self,
        request: Option<&VersionRequest>,
        content_type: ContentType,
    ) -> Result<Arc<dyn RSpecVersion>, RSpecError> {
        let request = request.unwrap_or(&self.default);
        self.resolve(&request.type_name, &request.version, content_type)
    }

    /// Highest registered version of a dialect type, compared numerically
    /// where possible.
    fn latest_version(&self, type_name: &str) -> Option<String> {
        self.adapters
            .iter()
            .map(|a| a.spec())
            .filter(|s| s.type_name.eq_ignore_ascii_case(type_name))
            .max_by_key(|s| (s.version.parse::<u64>().unwrap_or(0), s.version.clone()))
            .map(|s| s.version.clone())
    }

    /// Bind a parsed document to its adapter.
    ///
    /// Tried in order: an `xsi:schemaLocation` naming a registered schema;
    /// the default namespace together with the root `type`
    /// (advertisement/request/manifest); the root `type`/`version`
    /// attributes. Dialects whose XML does not carry the content type use
    /// `hint`, defaulting to an advertisement.
    pub fn detect(
        &self,
        root: &XmlElement,
        hint: Option<ContentType>,
    ) -> Result<(Arc<dyn RSpecVersion>, ContentType), RSpecError> {
        if !root.is("rspec") {
            return Err(RSpecError::invalid(format!(
                "root element is <{}>, expected <rspec>",
                root.name
            )));
        }
        let root_type = root.attr("type");
        let declared = root_type.and_then(ContentType::from_wire);
        let content_type = |adapter: &Arc<dyn RSpecVersion>| {
            adapter
                .spec()
                .content_type
                .or(declared)
                .or(hint)
                .unwrap_or(ContentType::Ad)
        };

        if let Some(location) = root.attr("xsi:schemaLocation") {
            let tokens: Vec<&str> = location.split_whitespace().collect();
            if let Some(adapter) = self
                .adapters
                .iter()
                .find(|a| a.schema().is_some_and(|s| tokens.contains(&s)))
            {
                tracing::debug!(dialect = %adapter.spec(), "detected rspec version by schema");
                return Ok((adapter.clone(), content_type(adapter)));
            }
        }

        if let (Some(ns), Some(ct)) = (root.attr("xmlns"), declared) {
            if let Some(adapter) = self
                .adapters
                .iter()
                .find(|a| a.namespace() == Some(ns) && a.spec().content_type == Some(ct))
            {
                tracing::debug!(dialect = %adapter.spec(), "detected rspec version by namespace");
                return Ok((adapter.clone(), ct));
            }
        }

        let Some(type_name) = root_type.filter(|_| declared.is_none()) else {
            return Err(RSpecError::unknown_version(
                root_type.unwrap_or_default(),
                root.attr("version").unwrap_or_default(),
                declared.or(hint).map(|c| c.as_str()).unwrap_or("*"),
            ));
        };
        let version = match root.attr("version") {
            Some(v) => v.to_string(),
            None => self
                .latest_version(type_name)
                .ok_or_else(|| RSpecError::unknown_version(type_name, "", "*"))?,
        };
        let ct = hint.unwrap_or(ContentType::Ad);
        let adapter = self.resolve(type_name, &version, ct)?;
        tracing::debug!(dialect = %adapter.spec(), "detected rspec version by root attributes");
        Ok((adapter, ct))
    }

    /// One entry per registered `(type, version)`, described by the adapter
    /// that serves `content_type`.
    pub fn advertised(&self, content_type: ContentType) -> Vec<AdvertisedVersion> {
        let mut seen: Vec<(String, String)> = Vec::new();
        let mut out = Vec::new();
        for adapter in &self.adapters {
            let spec = adapter.spec();
            let key = (spec.type_name.clone(), spec.version.clone());
            if seen.contains(&key) {
                continue;
            }
            let Ok(chosen) = self.resolve(&spec.type_name, &spec.version, content_type) else {
                continue;
            };
            seen.push(key);
            out.push(AdvertisedVersion {
                type_name: spec.type_name.clone(),
                version: spec.version.clone(),
                schema: chosen.schema().map(str::to_string),
                namespace: chosen.namespace().map(str::to_string),
                extensions: chosen
                    .extensions()
                    .iter()
                    .map(|(_, uri)| uri.to_string())
                    .collect(),
            });
        }
        out
    }
}

impl Default for VersionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    #[test]
    fn resolve_prefers_exact_content_type() {
        let registry = VersionRegistry::builtin();
        let adapter = registry.resolve("geni", "3", ContentType::Manifest).unwrap();
        assert_eq!(adapter.spec().content_type, Some(ContentType::Manifest));
        let sfa = registry.resolve("SFA", "1", ContentType::Request).unwrap();
        assert_eq!(sfa.spec().content_type, None);
    }

    #[test]
    fn unknown_versions_are_never_substituted() {
        let registry = VersionRegistry::builtin();
        let err = registry
            .get_version(Some(&VersionRequest::new("GENI", "9")))
            .unwrap_err();
        assert!(matches!(err, RSpecError::UnknownRSpecVersion { .. }));
        assert!(registry.resolve("Bogus", "1", ContentType::Ad).is_err());
    }

    #[test]
    fn get_version_applies_default() {
        let registry = VersionRegistry::builtin();
        let spec = registry.get_version(None).unwrap();
        assert_eq!(spec, VersionSpec::new("GENI", "3", None));
    }

    #[test]
    fn retain_disables_dialects() {
        let mut registry = VersionRegistry::builtin();
        registry.retain(&[VersionRequest::new("GENI", "3"), VersionRequest::new("SFA", "1")]);
        assert!(registry.resolve("ProtoGENI", "2", ContentType::Ad).is_err());
        assert!(registry.resolve("SFA", "1", ContentType::Ad).is_ok());
        assert!(registry
            .set_default(VersionRequest::new("ProtoGENI", "2"))
            .is_err());
    }

    #[test]
    fn detect_by_schema_namespace_and_attributes() {
        let registry = VersionRegistry::builtin();

        let by_schema = xml::parse(
            r#"<rspec xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                      xsi:schemaLocation="http://www.geni.net/resources/rspec/3 http://www.geni.net/resources/rspec/3/request.xsd"
                      type="request"/>"#,
        )
        .unwrap();
        let (adapter, ct) = registry.detect(&by_schema, None).unwrap();
        assert!(adapter.spec().is("GENI", "3"));
        assert_eq!(ct, ContentType::Request);

        let by_namespace = xml::parse(
            r#"<rspec type="advertisement" xmlns="http://www.protogeni.net/resources/rspec/2"/>"#,
        )
        .unwrap();
        let (adapter, ct) = registry.detect(&by_namespace, None).unwrap();
        assert!(adapter.spec().is("ProtoGENI", "2"));
        assert_eq!(ct, ContentType::Ad);

        let by_attributes = xml::parse(r#"<rspec type="SFA"/>"#).unwrap();
        let (adapter, ct) = registry
            .detect(&by_attributes, Some(ContentType::Manifest))
            .unwrap();
        assert!(adapter.spec().is("SFA", "1"));
        assert_eq!(ct, ContentType::Manifest);
    }

    #[test]
    fn detect_rejects_unknown_documents() {
        let registry = VersionRegistry::builtin();
        let unknown = xml::parse(r#"<rspec type="Bogus" version="4"/>"#).unwrap();
        assert!(matches!(
            registry.detect(&unknown, None),
            Err(RSpecError::UnknownRSpecVersion { .. })
        ));
        let not_rspec = xml::parse("<html/>").unwrap();
        assert!(matches!(
            registry.detect(&not_rspec, None),
            Err(RSpecError::InvalidRSpec(_))
        ));
    }

    #[test]
    fn advertised_lists_each_dialect_once() {
        let registry = VersionRegistry::builtin();
        let ads = registry.advertised(ContentType::Ad);
        assert_eq!(ads.len(), 6);
        let geni = ads.iter().find(|v| v.type_name == "GENI").unwrap();
        assert_eq!(
            geni.schema.as_deref(),
            Some("http://www.geni.net/resources/rspec/3/ad.xsd")
        );
    }
}
