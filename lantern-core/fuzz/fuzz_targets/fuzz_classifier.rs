#![no_main]

use libfuzzer_sys::fuzz_target;
use lantern_core::core_discovery::{Classification, Classifier, DirectEndpoint, PeerUri};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let classifier = Classifier::new("bob@example.com/-lan-2", vec!["appspot".to_string()], 443);
    match classifier.classify(raw) {
        Ok(Classification::GeneralDirect(endpoint)) => {
            // Whatever parsed must survive a second parse of its own address
            assert!(DirectEndpoint::parse(&endpoint.address()).is_ok());
        }
        Ok(Classification::TrustedPeer(peer)) | Ok(Classification::AnonymousPeer(peer)) => {
            assert!(PeerUri::parse(peer.as_str()).is_ok());
        }
        _ => {}
    }
});
