pub mod profile;

pub use profile::{
    ApiVersion, ConsentState, FieldSelection, ProfileField, ProfileReadRequest, ProfileView,
    ReadProfileQuery, ReadProfileResponse, Requester,
};
