use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    RazorpayOrder,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::RazorpayOrder => "razorpay_order",
        }
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
