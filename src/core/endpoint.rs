use crate::config::{ServiceDefinition, PLACEHOLDER};
use crate::domain::model::{DeclaredConfig, EndpointDescriptor, LOCAL_HOST};
use crate::utils::error::{InstallError, Result};
use std::collections::BTreeMap;

const RESERVED: [&str; 2] = ["host", "port"];

/// Build the connection endpoint from the live port binding and the
/// workload's declared environment.
pub fn resolve(
    definition: &ServiceDefinition,
    live_binding: &str,
    declared: &DeclaredConfig,
) -> Result<EndpointDescriptor> {
    let port = resolve_port(definition, live_binding);

    let empty = BTreeMap::new();
    let env = declared
        .environment(&definition.service_name)
        .unwrap_or_else(|| {
            tracing::warn!(
                service = %definition.service_name,
                "Service not declared in compose file, using defaults only"
            );
            &empty
        });

    let params = resolve_params(definition, env);

    let mut values = params.clone();
    values.insert("host".to_string(), LOCAL_HOST.to_string());
    values.insert("port".to_string(), port.clone());

    let uri = render_template(&definition.uri_format, &values)?;
    let masked_uri = match values.get_mut("password") {
        Some(password) => {
            *password = EndpointDescriptor::REDACTED.to_string();
            Some(render_template(&definition.uri_format, &values)?)
        }
        None => None,
    };

    Ok(EndpointDescriptor {
        host: LOCAL_HOST.to_string(),
        port,
        params,
        uri,
        masked_uri,
    })
}

/// Text after the last `:` of the binding; otherwise the `port` default or the port key.
pub fn resolve_port(definition: &ServiceDefinition, live_binding: &str) -> String {
    match live_binding.rsplit_once(':') {
        Some((_, port)) => port.to_string(),
        None => definition
            .defaults
            .get("port")
            .cloned()
            .unwrap_or_else(|| definition.port_key.clone()),
    }
}

fn resolve_params(
    definition: &ServiceDefinition,
    env: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();

    for (name, env_var) in &definition.env_vars {
        if RESERVED.contains(&name.as_str()) {
            continue;
        }
        let value = Some(env_var.as_str())
            .filter(|var| !var.is_empty())
            .and_then(|var| env.get(var))
            .or_else(|| definition.defaults.get(name));

        if let Some(value) = value {
            params.insert(name.clone(), value.clone());
        }
    }

    // defaults 中沒有對應環境變數的參數
    for (name, value) in &definition.defaults {
        if !RESERVED.contains(&name.as_str()) && !params.contains_key(name) {
            params.insert(name.clone(), value.clone());
        }
    }

    if let Some(password) = params.get_mut("password") {
        *password = encode_password(password);
    }

    params
}

/// Percent-encode a credential for the userinfo segment of a URI.
///
/// Form encoding writes a space as `+`, which userinfo decoding keeps as a
/// literal plus; a real `+` is already `%2B`, so every `+` left is a space.
pub fn encode_password(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .map(|chunk| if chunk == "+" { "%20" } else { chunk })
        .collect()
}

/// Substitute `{name}` placeholders; any placeholder without a value fails.
pub fn render_template(template: &str, values: &BTreeMap<String, String>) -> Result<String> {
    let re = &*PLACEHOLDER;

    if let Some(missing) = re
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .find(|name| !values.contains_key(name))
    {
        return Err(InstallError::TemplateResolutionFailed {
            template: template.to_string(),
            parameter: missing,
        });
    }

    Ok(re
        .replace_all(template, |caps: &regex::Captures| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned())
}
