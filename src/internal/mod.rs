mod ordered_entry;
pub(crate) use ordered_entry::OrderedEntry;

mod reservation;
pub(crate) use reservation::Reservation;
