// @generated
// This file is @generated by prost-build.
/// A normalized trade as reported by an exchange.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TradeRequest {
    /// Trade price as reported by the exchange (decimal string).
    #[prost(string, tag = "1")]
    pub price: ::prost::alloc::string::String,
    /// Traded quantity as reported by the exchange (decimal string).
    #[prost(string, tag = "2")]
    pub quantity: ::prost::alloc::string::String,
    /// Trade time in seconds since the Unix epoch.
    #[prost(double, tag = "3")]
    pub trade_time: f64,
    /// Exchange-native symbol.
    #[prost(string, tag = "4")]
    pub symbol: ::prost::alloc::string::String,
    /// Exchange name.
    #[prost(string, tag = "5")]
    pub exchange: ::prost::alloc::string::String,
}
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Empty {}
