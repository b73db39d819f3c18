#![no_main]

use libfuzzer_sys::fuzz_target;
use lantern_core::core_discovery::HubMessage;

fuzz_target!(|data: &[u8]| {
    // Hub bodies arrive as arbitrary text from the channel
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(message) = HubMessage::parse(body) {
        let _ = message.report_after.map(|d| d.as_millis());
        for server in &message.servers {
            let _ = server.trim();
        }
    }
});
