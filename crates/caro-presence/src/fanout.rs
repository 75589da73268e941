use caro_protocol::{Directory, Event, PlayerId, Publisher, RoomCode, Topic};
use tracing::debug;

/// Publishes `user-online` or `user-offline` for `player` to each friend's
/// private topic and, when given, to the room the player is in.
pub fn announce(
    publisher: &dyn Publisher,
    directory: &dyn Directory,
    player: PlayerId,
    online: bool,
    room: Option<&RoomCode>,
) {
    let event = if online {
        Event::UserOnline { player_id: player }
    } else {
        Event::UserOffline { player_id: player }
    };

    let friends = directory.friends(player);
    debug!(%player, online, friends = friends.len(), "announcing presence");
    for friend in friends {
        publisher.publish(Topic::User(friend), event.clone());
    }
    if let Some(code) = room {
        publisher.publish(Topic::Room(code.clone()), event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caro_protocol::{PlayerDisplay, RecordingPublisher};

    struct Friends;

    impl Directory for Friends {
        fn display(&self, player_id: PlayerId) -> PlayerDisplay {
            PlayerDisplay {
                player_id,
                username: "x".into(),
            }
        }

        fn friends(&self, _player_id: PlayerId) -> Vec<PlayerId> {
            vec![PlayerId(2), PlayerId(3)]
        }
    }

    #[test]
    fn test_announce_reaches_friends_and_room() {
        let publisher = RecordingPublisher::new();
        let room = RoomCode::new("ROOM42");
        announce(&publisher, &Friends, PlayerId(1), false, Some(&room));

        let offline = Event::UserOffline { player_id: PlayerId(1) };
        assert_eq!(publisher.events_for(&Topic::User(PlayerId(2))), vec![offline.clone()]);
        assert_eq!(publisher.events_for(&Topic::User(PlayerId(3))), vec![offline.clone()]);
        assert_eq!(publisher.events_for(&Topic::Room(room)), vec![offline]);
    }

    #[test]
    fn test_announce_without_room_only_reaches_friends() {
        let publisher = RecordingPublisher::new();
        announce(&publisher, &Friends, PlayerId(1), true, None);
        assert_eq!(publisher.events().len(), 2);
    }
}
