mod check;
mod links;
mod trigger;
