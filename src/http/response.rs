//! The single fixed response page.

use core::fmt::Write;

/// Enough for the page with a five-digit refresh value.
pub const RESPONSE_CAPACITY: usize = 320;

pub type ResponseBytes = heapless::String<RESPONSE_CAPACITY>;

/// Render the response served to every completed request.
pub fn render(refresh_secs: u16) -> ResponseBytes {
    let mut out = ResponseBytes::new();
    // Capacity covers the fixed text plus any u16.
    let _ = write!(
        out,
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html\r\n\
         Connection: close\r\n\
         Refresh: {refresh_secs}\r\n\
         \r\n\
         <!DOCTYPE HTML>\r\n\
         <html>\r\n\
         Click <a href=\"/H\">here</a> to turn the LED on<br>\r\n\
         Click <a href=\"/L\">here</a> turn the LED off<br>\r\n\
         </html>\r\n"
    );
    out
}
