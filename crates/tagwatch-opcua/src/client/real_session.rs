// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA session built on the `opcua` crate.
//!
//! The `opcua` client API is synchronous; every service call runs on the
//! blocking pool so the async runtime never stalls. Publish responses are
//! processed by the session's own run loop, started on connect, which invokes
//! the data change callback on its thread. The callback forwards values to
//! the notification channel and returns immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagwatch_opcua::client::RealOpcUaSession;
//! use tagwatch_opcua::types::SessionConfig;
//!
//! let mut session = RealOpcUaSession::new(SessionConfig::new("opc.tcp://localhost:4840"));
//! session.connect().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use opcua::client::prelude::{
    AttributeService, ClientBuilder, DataChangeCallback, IdentityToken, MonitoredItem,
    MonitoredItemService, Session, SessionCommand, SubscriptionService,
};
use opcua::sync::RwLock as OpcUaRwLock;
use opcua::types as ua;

use tagwatch_core::{DataValue, NodeHandle, NodeId, NodeIdentifier, StatusCode, TagIdentifier, Variant};

use crate::error::{
    ConnectionError, OpcUaError, OpcUaResult, OperationError, ResolutionError, SessionError,
    SubscriptionError,
};
use crate::types::{SecurityMode, SecurityPolicy, SessionConfig, UserIdentity};

use super::session::{MonitoredItemId, NotificationSender, OpcUaSession, SubscriptionId, DataChangeNotification};

type SharedSession = Arc<OpcUaRwLock<Session>>;

// =============================================================================
// RealOpcUaSession
// =============================================================================

/// [`OpcUaSession`] talking to a real server.
pub struct RealOpcUaSession {
    config: SessionConfig,
    session: Option<SharedSession>,
    run_loop: Option<oneshot::Sender<SessionCommand>>,
}

impl RealOpcUaSession {
    /// Creates an unconnected session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: None,
            run_loop: None,
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn shared(&self) -> OpcUaResult<SharedSession> {
        self.session.clone().ok_or_else(OpcUaError::not_connected)
    }

    /// Runs a synchronous service call on the blocking pool.
    async fn call<R, F>(&self, f: F) -> OpcUaResult<R>
    where
        F: FnOnce(&Session) -> OpcUaResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let session = self.shared()?;
        tokio::task::spawn_blocking(move || {
            let session = session.read();
            f(&session)
        })
        .await
        .map_err(|e| OpcUaError::session(SessionError::closed(format!("service call aborted: {e}"))))?
    }

    fn security_policy(policy: SecurityPolicy) -> opcua::crypto::SecurityPolicy {
        match policy {
            SecurityPolicy::None => opcua::crypto::SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15 => opcua::crypto::SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256 => opcua::crypto::SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256 => opcua::crypto::SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep => opcua::crypto::SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss => opcua::crypto::SecurityPolicy::Aes256Sha256RsaPss,
        }
    }

    fn message_security_mode(mode: SecurityMode) -> ua::MessageSecurityMode {
        match mode {
            SecurityMode::None => ua::MessageSecurityMode::None,
            SecurityMode::Sign => ua::MessageSecurityMode::Sign,
            SecurityMode::SignAndEncrypt => ua::MessageSecurityMode::SignAndEncrypt,
        }
    }

    fn identity_token(user: &UserIdentity) -> IdentityToken {
        match user {
            UserIdentity::Anonymous => IdentityToken::Anonymous,
            UserIdentity::UserName { username, password } => {
                IdentityToken::UserName(username.clone(), password.clone())
            }
        }
    }

    /// Connects synchronously; runs on the blocking pool.
    fn open_session(config: &SessionConfig) -> OpcUaResult<SharedSession> {
        let mut client = ClientBuilder::new()
            .application_name(config.application_name.as_str())
            .application_uri(config.application_uri.as_str())
            .session_retry_limit(0)
            .session_timeout(config.session_timeout.as_millis().min(u32::MAX as u128) as u32)
            .trust_server_certs(config.trust_server_certs)
            .client()
            .ok_or_else(|| OpcUaError::session_failed("Failed to build OPC UA client"))?;

        let endpoints = client
            .get_server_endpoints_from_url(config.endpoint.as_str())
            .map_err(|e| {
                OpcUaError::connection(ConnectionError::endpoint_not_found(format!(
                    "{}: {}",
                    config.endpoint, e
                )))
            })?;

        let policy = Self::security_policy(config.security_policy);
        let mode = Self::message_security_mode(config.security_mode);

        let endpoint = endpoints
            .iter()
            .find(|e| e.security_policy_uri.as_ref() == policy.to_uri() && e.security_mode == mode)
            .cloned()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::no_suitable_endpoint(
                    config.security_mode.name(),
                    config.security_policy.name(),
                ))
            })?;

        tracing::debug!(
            security_policy = %endpoint.security_policy_uri,
            security_mode = ?endpoint.security_mode,
            "Found matching endpoint"
        );

        client
            .connect_to_endpoint(endpoint, Self::identity_token(&config.user))
            .map_err(|status| {
                tracing::debug!(status = %status, "Session activation failed");
                OpcUaError::connection(ConnectionError::refused(config.endpoint.as_str()))
            })
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    fn to_ua_node_id(node_id: &NodeId) -> ua::NodeId {
        let ns = node_id.namespace_index;
        match &node_id.identifier {
            NodeIdentifier::Numeric(v) => ua::NodeId::new(ns, *v),
            NodeIdentifier::String(v) => ua::NodeId::new(ns, ua::UAString::from(v.as_str())),
            NodeIdentifier::Guid(v) => ua::NodeId::new(ns, ua::Guid::from(*v)),
            NodeIdentifier::Opaque(v) => ua::NodeId::new(ns, ua::ByteString::from(v.as_slice())),
        }
    }

    fn read_value_id(node_id: &NodeId, attribute: ua::AttributeId) -> ua::ReadValueId {
        ua::ReadValueId {
            node_id: Self::to_ua_node_id(node_id),
            attribute_id: attribute as u32,
            index_range: ua::UAString::null(),
            data_encoding: ua::QualifiedName::null(),
        }
    }

    fn from_ua_timestamp(ts: &ua::DateTime) -> Option<DateTime<Utc>> {
        let chrono_ts = ts.as_chrono();
        DateTime::from_timestamp(chrono_ts.timestamp(), chrono_ts.timestamp_subsec_nanos())
    }

    fn from_ua_variant(variant: &ua::Variant) -> Variant {
        use ua::Variant as V;

        match variant {
            V::Empty => Variant::Empty,
            V::Boolean(v) => Variant::Boolean(*v),
            V::SByte(v) => Variant::SByte(*v),
            V::Byte(v) => Variant::Byte(*v),
            V::Int16(v) => Variant::Int16(*v),
            V::UInt16(v) => Variant::UInt16(*v),
            V::Int32(v) => Variant::Int32(*v),
            V::UInt32(v) => Variant::UInt32(*v),
            V::Int64(v) => Variant::Int64(*v),
            V::UInt64(v) => Variant::UInt64(*v),
            V::Float(v) => Variant::Float(*v),
            V::Double(v) => Variant::Double(*v),
            V::String(v) => Variant::String(v.as_ref().to_string()),
            V::DateTime(v) => match Self::from_ua_timestamp(v) {
                Some(ts) => Variant::DateTime(ts),
                None => Variant::Other {
                    type_name: "DateTime".to_string(),
                    text: format!("{:?}", v),
                },
            },
            V::Guid(v) => Variant::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
            V::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
            V::Array(arr) => Variant::Array(arr.values.iter().map(Self::from_ua_variant).collect()),
            other => {
                let debug = format!("{:?}", other);
                let (type_name, text) = match debug.split_once('(') {
                    Some((name, rest)) => (name.to_string(), rest.trim_end_matches(')').to_string()),
                    None => (debug.clone(), debug),
                };
                Variant::Other { type_name, text }
            }
        }
    }

    fn from_ua_data_value(value: &ua::DataValue) -> DataValue {
        DataValue {
            value: value.value.as_ref().map(Self::from_ua_variant),
            status: value.status.map(|s| StatusCode(s.bits())),
            source_timestamp: value.source_timestamp.as_ref().and_then(Self::from_ua_timestamp),
            server_timestamp: value.server_timestamp.as_ref().and_then(Self::from_ua_timestamp),
        }
    }

    fn monitor_request(node_id: &NodeId, sampling_ms: f64, queue_size: u32) -> ua::MonitoredItemCreateRequest {
        ua::MonitoredItemCreateRequest {
            item_to_monitor: Self::read_value_id(node_id, ua::AttributeId::Value),
            monitoring_mode: ua::MonitoringMode::Reporting,
            requested_parameters: ua::MonitoringParameters {
                client_handle: 0,
                sampling_interval: sampling_ms,
                filter: ua::ExtensionObject::null(),
                queue_size,
                discard_oldest: true,
            },
        }
    }
}

#[async_trait]
impl OpcUaSession for RealOpcUaSession {
    async fn connect(&mut self) -> OpcUaResult<()> {
        if self.session.is_some() {
            return Ok(());
        }

        tracing::info!(endpoint = %self.config.endpoint, "Connecting to OPC UA server");

        let config = self.config.clone();
        let session = tokio::task::spawn_blocking(move || Self::open_session(&config))
            .await
            .map_err(|e| OpcUaError::session_failed(format!("connect task aborted: {e}")))??;

        self.run_loop = Some(Session::run_async(Arc::clone(&session)));
        self.session = Some(session);

        tracing::info!(endpoint = %self.config.endpoint, "Connected to OPC UA server");
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        if let Some(run_loop) = self.run_loop.take() {
            let _ = run_loop.send(SessionCommand::Stop);
        }
        if let Some(session) = self.session.take() {
            tracing::info!(endpoint = %self.config.endpoint, "Disconnecting from OPC UA server");
            tokio::task::spawn_blocking(move || session.read().disconnect())
                .await
                .map_err(|e| OpcUaError::session(SessionError::closed(format!("disconnect aborted: {e}"))))?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.read().is_connected())
            .unwrap_or(false)
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn resolve_node(&self, tag: &TagIdentifier) -> OpcUaResult<NodeHandle> {
        let node_id: NodeId = tag.as_str().parse().map_err(ResolutionError::from)?;

        if !self.config.verify_nodes {
            return Ok(NodeHandle::new(tag.clone(), node_id));
        }

        let request = Self::read_value_id(&node_id, ua::AttributeId::NodeClass);
        let label = node_id.to_string();
        let results = self
            .call(move |session| {
                session
                    .read(&[request], ua::TimestampsToReturn::Neither, 0.0)
                    .map_err(|status| OpcUaError::read_failed(label, status.to_string()))
            })
            .await?;

        match results.first() {
            Some(dv) if dv.status.map_or(true, |s| s.is_good()) && dv.value.is_some() => {
                Ok(NodeHandle::new(tag.clone(), node_id))
            }
            _ => Err(OpcUaError::unknown_node(node_id.to_string())),
        }
    }

    async fn read_value(&self, handle: &NodeHandle) -> OpcUaResult<DataValue> {
        let request = Self::read_value_id(handle.node_id(), ua::AttributeId::Value);
        let label = handle.node_id().to_string();

        tracing::trace!(node_id = %label, "Reading node value");

        let results = self
            .call(move |session| {
                session
                    .read(&[request], ua::TimestampsToReturn::Both, 0.0)
                    .map_err(|status| OpcUaError::operation(OperationError::bad_status(label, status)))
            })
            .await?;

        results
            .first()
            .map(Self::from_ua_data_value)
            .ok_or_else(|| OpcUaError::read_failed(handle.node_id().to_string(), "empty read response"))
    }

    async fn create_subscription(
        &self,
        interval: Duration,
        sender: NotificationSender,
    ) -> OpcUaResult<SubscriptionId> {
        let interval_ms = interval.as_millis() as f64;
        let lifetime = self.config.lifetime_count;
        let keep_alive = self.config.max_keep_alive_count;

        let callback = DataChangeCallback::new(move |items: &[&MonitoredItem]| {
            for item in items {
                let notification = DataChangeNotification::new(
                    MonitoredItemId(item.id()),
                    Self::from_ua_data_value(item.last_value()),
                );
                // receiver gone means the subscription is being torn down
                let _ = sender.send(notification);
            }
        });

        let id = self
            .call(move |session| {
                session
                    .create_subscription(interval_ms, lifetime, keep_alive, 0, 0, true, callback)
                    .map_err(|status| {
                        OpcUaError::subscription(SubscriptionError::creation_failed(status.to_string()))
                    })
            })
            .await?;

        Ok(SubscriptionId(id))
    }

    async fn watch(&self, subscription: SubscriptionId, handle: &NodeHandle) -> OpcUaResult<MonitoredItemId> {
        let mut results = self.watch_many(subscription, std::slice::from_ref(handle)).await?;
        results
            .pop()
            .unwrap_or_else(|| Err(OpcUaError::registration_failed(handle.node_id().to_string(), "empty response")))
    }

    async fn watch_many(
        &self,
        subscription: SubscriptionId,
        handles: &[NodeHandle],
    ) -> OpcUaResult<Vec<OpcUaResult<MonitoredItemId>>> {
        // sampling follows the publishing interval (-1 = use the subscription's)
        let requests: Vec<ua::MonitoredItemCreateRequest> = handles
            .iter()
            .map(|h| Self::monitor_request(h.node_id(), -1.0, self.config.queue_size))
            .collect();

        tracing::trace!(subscription_id = %subscription, count = handles.len(), "Creating monitored items");

        let results = self
            .call(move |session| {
                session
                    .create_monitored_items(subscription.0, ua::TimestampsToReturn::Both, &requests)
                    .map_err(|status| {
                        OpcUaError::registration_failed("batch", status.to_string())
                    })
            })
            .await?;

        Ok(handles
            .iter()
            .zip(results)
            .map(|(handle, result)| {
                if result.status_code.is_good() {
                    Ok(MonitoredItemId(result.monitored_item_id))
                } else {
                    Err(OpcUaError::registration_failed(
                        handle.node_id().to_string(),
                        result.status_code.to_string(),
                    ))
                }
            })
            .collect())
    }

    async fn unwatch(&self, subscription: SubscriptionId, item: MonitoredItemId) -> OpcUaResult<()> {
        let statuses = self
            .call(move |session| {
                session
                    .delete_monitored_items(subscription.0, &[item.0])
                    .map_err(|status| {
                        OpcUaError::subscription(SubscriptionError::unregistration_failed(item.0, status.to_string()))
                    })
            })
            .await?;

        match statuses.first() {
            Some(status) if !status.is_good() => Err(OpcUaError::subscription(
                SubscriptionError::unregistration_failed(item.0, status.to_string()),
            )),
            _ => Ok(()),
        }
    }

    async fn delete_subscription(&self, subscription: SubscriptionId) -> OpcUaResult<()> {
        self.call(move |session| {
            session
                .delete_subscription(subscription.0)
                .map(|_| ())
                .map_err(|status| {
                    OpcUaError::subscription(SubscriptionError::deletion_failed(subscription.0, status.to_string()))
                })
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================
