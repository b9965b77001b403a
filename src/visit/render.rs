use std::fmt::Write;

use crate::client_ip::IpFinding;

/// Render the visit page listing the client addresses and the counter
pub fn visit_page(findings: &[IpFinding], counter: i32) -> String {
    let mut body = String::from(
        "<!DOCTYPE html><html><head><title>Thanks for your visit!</title></head><body><b>IP addresses:</b><p>",
    );

    // Labels are fixed and addresses are parsed IPs, so nothing needs escaping
    for finding in findings {
        let _ = write!(
            body,
            "<b>Type:</b> {}, <b>value:</b> {}<br>",
            finding.source, finding.address
        );
    }

    let _ = write!(
        body,
        "</p><p><b>Number of visits so far:</b> {counter}</p></body></html>"
    );

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_ip::IpSource;

    #[test]
    fn test_visit_page_lists_findings_in_order() {
        let findings = vec![
            IpFinding {
                source: IpSource::RealIp,
                address: "203.0.113.5".parse().unwrap(),
            },
            IpFinding {
                source: IpSource::RemoteAddr,
                address: "::1".parse().unwrap(),
            },
        ];

        let page = visit_page(&findings, 42);

        let real = page
            .find("<b>Type:</b> real ip, <b>value:</b> 203.0.113.5<br>")
            .unwrap();
        let remote = page
            .find("<b>Type:</b> ip from remote addr, <b>value:</b> ::1<br>")
            .unwrap();
        assert!(real < remote);
        assert!(page.contains("<b>Number of visits so far:</b> 42</p>"));
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.ends_with("</html>"));
    }
}
