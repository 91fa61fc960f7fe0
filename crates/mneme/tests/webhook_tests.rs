//! End-to-end: a signature-verifying webhook handler, the shape of guest
//! workload this sandbox is built for.

use mneme::{run, py_repr, Ctx};

const HANDLER: &str = r#"
import hmac
import hashlib
import json

SECRET = "whsec_sandbox_test"

def parse_signature_header(header):
    parts = {}
    for item in header.split(","):
        if "=" not in item:
            continue
        key, value = item.split("=", 1)
        parts[key] = value
    return parts

def verify_signature(payload, header, secret):
    parts = parse_signature_header(header)
    timestamp = parts.get("t")
    signature = parts.get("v1")
    if timestamp is None or signature is None:
        return False
    signed = timestamp + "." + payload
    expected = hmac.new(secret, signed, hashlib.sha256).hexdigest()
    return hmac.compare_digest(expected, signature)

def handle_webhook(payload, header, secret):
    if not verify_signature(payload, header, secret):
        return {"status": "rejected", "reason": "invalid_signature"}
    event = json.loads(payload)
    if event["type"] == "invoice.paid":
        return {
            "status": "processed",
            "amount_paid": event["data"]["object"]["amount_paid"],
        }
    return {"status": "ignored", "type": event["type"]}

payload = json.dumps({
    "type": "invoice.paid",
    "data": {"object": {"amount_paid": 2000, "currency": "usd"}},
})
"#;

#[test]
fn valid_signature_processes_payment() {
    let source = format!(
        "{HANDLER}
timestamp = \"1699900000\"
sig = hmac.new(SECRET, timestamp + \".\" + payload, hashlib.sha256).hexdigest()
header = \"t=\" + timestamp + \",v1=\" + sig
result = handle_webhook(payload, header, SECRET)
print(result[\"status\"], result[\"amount_paid\"])
result
"
    );
    let mut ctx = Ctx::default();
    let value = run(&source, &mut ctx).unwrap().value().unwrap();
    assert_eq!(ctx.output(), "processed 2000\n");
    assert!(py_repr(&value).contains("'status': 'processed'"));
    assert!(py_repr(&value).contains("'amount_paid': 2000"));
}

#[test]
fn invalid_signature_is_rejected() {
    let source = format!(
        "{HANDLER}
header = \"t=1699900000,v1=deadbeef\"
result = handle_webhook(payload, header, SECRET)
result
"
    );
    let mut ctx = Ctx::default();
    let value = run(&source, &mut ctx).unwrap().value().unwrap();
    assert_eq!(
        py_repr(&value),
        "{'status': 'rejected', 'reason': 'invalid_signature'}"
    );
}

#[test]
fn malformed_header_is_rejected() {
    let source = format!(
        "{HANDLER}
result = handle_webhook(payload, \"no-equals-signs-here\", SECRET)
print(result[\"reason\"])
"
    );
    let mut ctx = Ctx::default();
    run(&source, &mut ctx).unwrap();
    assert_eq!(ctx.output(), "invalid_signature\n");
}

#[test]
fn other_event_types_are_ignored() {
    let source = format!(
        "{HANDLER}
other = json.dumps({{\"type\": \"customer.created\", \"data\": {{\"object\": {{}}}}}})
timestamp = \"1699900000\"
sig = hmac.new(SECRET, timestamp + \".\" + other, hashlib.sha256).hexdigest()
result = handle_webhook(other, \"t=\" + timestamp + \",v1=\" + sig, SECRET)
print(result[\"status\"], result[\"type\"])
"
    );
    let mut ctx = Ctx::default();
    run(&source, &mut ctx).unwrap();
    assert_eq!(ctx.output(), "ignored customer.created\n");
}
