// Entities making up one D-channel stack
#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy)]
pub enum PriEntity {
    /// HDLC frame I/O towards the D-channel driver
    PhyIo,
    /// Q.921 data link layer, including TEI management
    Lapd,
    /// Q.931 call control and Q.932 supplementary services
    CallControl,
    /// The embedding application. Receives host events
    Host,
}
