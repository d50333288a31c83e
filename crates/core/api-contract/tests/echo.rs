use api_contract::{EchoRequest, EchoResponse, INTENT_REQUEST, LAUNCH_REQUEST};
use serde_json::json;

#[test]
fn intent_request_reads_session_application() {
    let request: EchoRequest = serde_json::from_value(json!({
        "version": "1.0",
        "session": {
            "new": true,
            "sessionId": "s-1",
            "application": { "applicationId": "amzn1.ask.skill.garden" }
        },
        "request": {
            "type": "IntentRequest",
            "requestId": "r-1",
            "intent": { "name": "GardenIntent", "slots": {} }
        }
    }))
    .expect("request");
    assert_eq!(request.application_id(), Some("amzn1.ask.skill.garden"));
    assert_eq!(request.request_type(), INTENT_REQUEST);
    assert_eq!(request.intent_name(), Some("GardenIntent"));
}

#[test]
fn launch_request_falls_back_to_context_application() {
    let request: EchoRequest = serde_json::from_value(json!({
        "version": "1.0",
        "context": {
            "System": { "application": { "applicationId": "amzn1.ask.skill.garden" } }
        },
        "request": { "type": "LaunchRequest" }
    }))
    .expect("request");
    assert_eq!(request.application_id(), Some("amzn1.ask.skill.garden"));
    assert_eq!(request.request_type(), LAUNCH_REQUEST);
    assert_eq!(request.intent_name(), None);
}

#[test]
fn request_without_application_has_no_id() {
    let request: EchoRequest =
        serde_json::from_value(json!({ "request": { "type": "LaunchRequest" } }))
            .expect("request");
    assert_eq!(request.application_id(), None);
}

#[test]
fn response_serializes_speech_and_card() {
    let response = EchoResponse::new()
        .output_speech("it is 36 degrees")
        .card("Garden", "it is 36 degrees");
    let value = serde_json::to_value(&response).expect("json");
    assert_eq!(
        value,
        json!({
            "version": "1.0",
            "response": {
                "outputSpeech": { "type": "PlainText", "text": "it is 36 degrees" },
                "card": { "type": "Simple", "title": "Garden", "content": "it is 36 degrees" },
                "shouldEndSession": true
            }
        })
    );
}

#[test]
fn empty_response_only_ends_session() {
    let value = serde_json::to_value(EchoResponse::new()).expect("json");
    assert_eq!(
        value,
        json!({ "version": "1.0", "response": { "shouldEndSession": true } })
    );
}
