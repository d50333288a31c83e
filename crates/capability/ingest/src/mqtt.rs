//! MQTT 采集源
//!
//! 事件循环驱动 [`Session`] 状态机：
//! - ConnAck：重置退避并（重新）订阅配置的 topic（QoS 0）
//! - SubAck 失败或订阅请求无法入队：宽限 1s 后发送 DISCONNECT 并关闭连接，由重连策略重试
//! - Publish：交给 [`RawMessageHandler`]（逐条串行处理）
//! - 连接错误：按指数退避（上限可配）等待后以新的 client 重连，永不放弃
//!
//! 首次连接失败直接返回错误，不进入重连。

use crate::session::{Backoff, ConnectionState, Session, SubscribeOutcome};
use crate::{IngestError, RawMessageHandler, ReadySignal, Source, now_epoch_ms};
use async_trait::async_trait;
use domain::RawMessage;
use iot2alexa_telemetry::{
    record_connection, record_connection_lost, record_message_received, record_subscribe_failure,
};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeReasonCode,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// MQTT 采集源配置。
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic: String,
    pub client_id: String,
    pub keep_alive: Duration,
    pub initial_reconnect_interval: Duration,
    pub max_reconnect_interval: Duration,
}

impl MqttSourceConfig {
    /// broker 地址（日志用）。
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = self.username.as_ref() {
            options.set_credentials(username, self.password.clone().unwrap_or_default());
        }
        options
    }
}

/// MQTT 采集源。
pub struct MqttSource {
    config: MqttSourceConfig,
    state: watch::Sender<ConnectionState>,
}

impl MqttSource {
    pub fn new(config: MqttSourceConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self { config, state }
    }

    pub fn config(&self) -> &MqttSourceConfig {
        &self.config
    }

    /// 当前连接状态。
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// 订阅连接状态变化。
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn publish_state(&self, session: &Session) {
        self.state.send_replace(session.state());
    }
}

#[async_trait]
impl Source for MqttSource {
    async fn run(
        &self,
        handler: Arc<dyn RawMessageHandler>,
        mut ready: ReadySignal,
    ) -> Result<(), IngestError> {
        let server = self.config.server();
        let mut session = Session::new(
            self.config.topic.clone(),
            Backoff::new(
                self.config.initial_reconnect_interval,
                self.config.max_reconnect_interval,
            ),
        );

        loop {
            session.begin_connect();
            self.publish_state(&session);

            // 每次连接使用新的 client/eventloop；drive 返回时 eventloop 被丢弃，socket 随之关闭
            let (client, eventloop) = AsyncClient::new(self.config.options(), 10);
            let mut grace_timer = None;
            let reason = self
                .drive(
                    &client,
                    eventloop,
                    &mut session,
                    handler.as_ref(),
                    &mut ready,
                    &mut grace_timer,
                )
                .await;
            if let Some(timer) = grace_timer.take() {
                timer.abort();
            }

            if ready.is_pending() {
                let err = IngestError::Connect(format!("{}: {}", server, reason));
                ready.notify(Err(err.clone()));
                return Err(err);
            }
            record_connection_lost();
            let delay = session.on_connection_lost();
            self.publish_state(&session);
            warn!(
                target: "iot2alexa.ingest",
                server = %server,
                error = %reason,
                retry_in_ms = delay.as_millis() as u64,
                "mqtt_connection_lost"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl MqttSource {
    /// 驱动一次连接直到断开，返回断开原因。
    async fn drive(
        &self,
        client: &AsyncClient,
        mut eventloop: EventLoop,
        session: &mut Session,
        handler: &dyn RawMessageHandler,
        ready: &mut ReadySignal,
        grace_timer: &mut Option<JoinHandle<()>>,
    ) -> String {
        let server = self.config.server();
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    record_connection();
                    let topic = session.on_connected().to_string();
                    self.publish_state(session);
                    ready.notify(Ok(()));
                    info!(
                        target: "iot2alexa.ingest",
                        server = %server,
                        topic = %topic,
                        "mqtt_connected_watching_topic"
                    );
                    if let Err(err) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        warn!(
                            target: "iot2alexa.ingest",
                            server = %server,
                            topic = %topic,
                            error = %err,
                            "mqtt_subscribe_request_failed"
                        );
                        let outcome = session.on_subscribe_result(false);
                        self.schedule_disconnect(client, outcome, grace_timer);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let success = ack
                        .return_codes
                        .iter()
                        .all(|code| matches!(code, SubscribeReasonCode::Success(_)));
                    if !success {
                        warn!(
                            target: "iot2alexa.ingest",
                            server = %server,
                            topic = %session.topic(),
                            return_codes = ?ack.return_codes,
                            "mqtt_subscribe_rejected"
                        );
                    }
                    let outcome = session.on_subscribe_result(success);
                    self.publish_state(session);
                    self.schedule_disconnect(client, outcome, grace_timer);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if !session.accepts(&publish.topic) {
                        warn!(target: "iot2alexa.ingest", topic = %publish.topic, "mqtt_topic_skipped");
                        continue;
                    }
                    record_message_received();
                    let message = RawMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                        received_at_ms: now_epoch_ms(),
                    };
                    debug!(
                        target: "iot2alexa.ingest",
                        topic = %message.topic,
                        payload_size = message.payload.len(),
                        "mqtt_message_received"
                    );
                    if let Err(err) = handler.handle(message).await {
                        warn!(target: "iot2alexa.ingest", error = %err, "message_handler_failed");
                    }
                }
                // DISCONNECT 已发出：客户端必须自行关闭连接
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    return "disconnected after failed subscription".to_string();
                }
                Ok(_) => {}
                Err(err) => return err.to_string(),
            }
        }
    }

    fn schedule_disconnect(
        &self,
        client: &AsyncClient,
        outcome: SubscribeOutcome,
        grace_timer: &mut Option<JoinHandle<()>>,
    ) {
        let SubscribeOutcome::DisconnectAfter(grace) = outcome else {
            return;
        };
        record_subscribe_failure();
        warn!(
            target: "iot2alexa.ingest",
            topic = %self.config.topic,
            grace_ms = grace.as_millis() as u64,
            "mqtt_disconnect_scheduled"
        );
        let client = client.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Err(err) = client.disconnect().await {
                warn!(target: "iot2alexa.ingest", error = %err, "mqtt_disconnect_failed");
            }
        });
        if let Some(previous) = grace_timer.replace(timer) {
            previous.abort();
        }
    }
}
